use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::upload::UploadCandidate;

/// Shape of a loaded dataset as reported by the server after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub headers: Vec<String>,
    pub row_count: u64,
}

/// A single cell as delivered by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Column name to value. A missing key or `None` marks an absent value.
pub type Row = HashMap<String, Option<CellValue>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResult {
    pub rows: Vec<Row>,
    pub total_records: u64,
}

impl PageResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Text shown for `header` in `row`. Absent and empty values render as `-`.
pub fn display_cell(row: &Row, header: &str) -> String {
    match row.get(header) {
        Some(Some(CellValue::Text(s))) if s.is_empty() => "-".to_string(),
        Some(Some(value)) => value
            .to_string()
            .replace("\r\n", " ↵ ")
            .replace('\n', " ↵ "),
        _ => "-".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// The four operations the viewer needs from the remote dataset service.
///
/// Implementations block until the server answered, callers run them off the
/// event loop.
pub trait DataService: Send + Sync {
    fn upload(&self, file: &UploadCandidate) -> Result<DatasetDescriptor, ServiceError>;
    fn list_page(&self, page: u64, page_size: u64) -> Result<PageResult, ServiceError>;
    fn search_page(
        &self,
        query_text: &str,
        page: u64,
        page_size: u64,
    ) -> Result<PageResult, ServiceError>;
    fn clear(&self) -> Result<(), ServiceError>;
}
