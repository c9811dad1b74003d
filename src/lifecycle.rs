use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::ValidationError;
use crate::service::{DatasetDescriptor, ServiceError};
use crate::state::ViewState;
use crate::upload::UploadCandidate;

/// A failed dataset operation. Kept apart from fetch errors, which live in the
/// view state.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("upload failed: {0}")]
    Upload(#[source] ServiceError),
    #[error("clearing the dataset failed: {0}")]
    Clear(#[source] ServiceError),
    #[error("an upload is already running")]
    UploadPending,
    #[error("the dataset is already being cleared")]
    ClearPending,
    #[error("no dataset loaded")]
    NoDataset,
    #[error("wait for the running {0} to finish")]
    Busy(&'static str),
}

/// Moves the view between "no dataset" and "dataset loaded".
#[derive(Debug, Default)]
pub struct DatasetLifecycle {
    uploading: Option<UploadCandidate>,
    clearing: bool,
    last_error: Option<LifecycleError>,
}

impl DatasetLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploading(&self) -> Option<&UploadCandidate> {
        self.uploading.as_ref()
    }

    pub fn clearing(&self) -> bool {
        self.clearing
    }

    pub fn last_error(&self) -> Option<&LifecycleError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Record a local rejection. Nothing is sent and the view is untouched.
    pub fn reject(&mut self, err: impl Into<LifecycleError>) {
        let err = err.into();
        warn!("{err}");
        self.last_error = Some(err);
    }

    /// Start an upload, returns false if one is already running.
    pub fn begin_upload(&mut self, candidate: UploadCandidate) -> bool {
        if self.uploading.is_some() {
            self.reject(LifecycleError::UploadPending);
            return false;
        }
        if self.clearing {
            self.reject(LifecycleError::Busy("clear"));
            return false;
        }
        info!("Uploading {} ({} bytes)", candidate.file_name, candidate.file_size);
        self.last_error = None;
        self.uploading = Some(candidate);
        true
    }

    pub fn on_upload_failure(&mut self, err: ServiceError) {
        self.uploading = None;
        error!("Upload failed: {err}");
        self.last_error = Some(LifecycleError::Upload(err));
    }

    /// Swap in the new dataset and reset query and result. The caller issues
    /// the first page fetch for the reset query.
    pub fn on_upload_success(&mut self, view: &mut ViewState, descriptor: DatasetDescriptor) {
        info!(
            "Dataset loaded: {} records, {} columns",
            descriptor.row_count,
            descriptor.headers.len()
        );
        self.uploading = None;
        self.last_error = None;
        view.reset(Some(descriptor));
    }

    /// Start a remote clear, returns false if nothing should be sent.
    pub fn begin_clear(&mut self, view: &ViewState) -> bool {
        if view.dataset().is_none() {
            self.reject(LifecycleError::NoDataset);
            return false;
        }
        if self.clearing {
            self.reject(LifecycleError::ClearPending);
            return false;
        }
        if self.uploading.is_some() {
            self.reject(LifecycleError::Busy("upload"));
            return false;
        }
        info!("Clearing dataset ...");
        self.last_error = None;
        self.clearing = true;
        true
    }

    /// Only a confirmed remote clear resets local state.
    pub fn on_clear_result(&mut self, view: &mut ViewState, outcome: Result<(), ServiceError>) {
        self.clearing = false;
        match outcome {
            Ok(()) => {
                info!("Dataset cleared");
                self.last_error = None;
                view.reset(None);
            }
            Err(e) => {
                error!("Clear failed: {e}");
                self.last_error = Some(LifecycleError::Clear(e));
            }
        }
    }
}
