use std::path::PathBuf;
use std::time::{Duration, Instant};

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::orchestrator::{FetchRequest, RequestToken};
use crate::service::{DatasetDescriptor, PageResult, ServiceError};
use crate::upload::UploadCandidate;

/// Number of records requested per page.
pub const PAGE_SIZE: u64 = 50;

/// Uploads above this size still go through, the user just gets a notice.
pub const UPLOAD_SIZE_HINT: u64 = 10 * 1024 * 1024;

pub const HELP_TEXT: &str = "\
Navigation
  Left / h / p      previous page
  Right / l / n     next page
  Home / g          first page
  End / G           last page
  :                 jump to page
  Up / k, Down / j  move row selection
  r                 reload current page

Search
  /                 edit search text
  Enter             apply search now
  Esc               clear search
  x                 clear search from table

Dataset
  u                 upload a CSV file
  D                 clear dataset on the server
  y                 copy selected row

  ?                 help
  q                 quit";

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    pub server_url: String,
    pub request_timeout: Duration,
    pub workers: usize,
    pub search_debounce: Duration,
    pub event_poll_time: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            workers: 4,
            search_debounce: Duration::from_millis(250),
            event_poll_time: 50,
        }
    }
}

/// Which prompt the command line is collecting input for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
    Upload,
    GoToPage,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    GoToPage(u64),
    MoveUp,
    MoveDown,
    Reload,
    CopyRow,
    Help,
    Exit,
    ClearSearch,
    EnterSearch,
    EnterUpload,
    EnterGoToPage,
    RawKey(KeyEvent),
    Upload(PathBuf),
    ClearDataset,
    Tick(Instant),
    FetchCompleted {
        token: RequestToken,
        outcome: Result<PageResult, ServiceError>,
    },
    UploadCompleted(Result<DatasetDescriptor, ServiceError>),
    ClearCompleted(Result<(), ServiceError>),
}

/// Side effects requested by the model. Executed off the event loop, results
/// come back as `Message`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch(FetchRequest),
    Upload(UploadCandidate),
    Clear,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid server url '{url}': {message}")]
    InvalidServerUrl { url: String, message: String },
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to set up logging: {0}")]
    Logging(String),
}

/// Local rejection of an upload, raised before any request is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("could not expand path '{path}': {message}")]
    BadPath { path: String, message: String },
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },
    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },
    #[error("not a file: {path}")]
    NotAFile { path: PathBuf },
    #[error("please choose a CSV file: {path}")]
    NotCsv { path: PathBuf },
    #[error("could not read CSV header of {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}
