use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, warn};

use crate::domain::{UPLOAD_SIZE_HINT, ValidationError};

/// A local file that passed validation and may be sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub headers: Vec<String>,
}

impl UploadCandidate {
    pub fn exceeds_size_hint(&self) -> bool {
        self.file_size > UPLOAD_SIZE_HINT
    }

    pub fn size_mb(&self) -> f64 {
        self.file_size as f64 / 1024.0 / 1024.0
    }
}

/// Check a user supplied path before anything is sent over the wire.
pub fn inspect(input: &str) -> Result<UploadCandidate, ValidationError> {
    let expanded = shellexpand::full(input.trim()).map_err(|e| ValidationError::BadPath {
        path: input.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.as_ref());

    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ValidationError::FileNotFound { path: path.clone() },
        ErrorKind::PermissionDenied => ValidationError::PermissionDenied { path: path.clone() },
        _ => ValidationError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        },
    })?;
    if !metadata.is_file() {
        return Err(ValidationError::NotAFile { path });
    }
    if !is_csv_name(&path) {
        return Err(ValidationError::NotCsv { path });
    }

    let headers = sniff_headers(&path).map_err(|e| ValidationError::Malformed {
        path: path.clone(),
        message: e.to_string(),
    })?;
    if headers.is_empty() {
        return Err(ValidationError::Malformed {
            path,
            message: "no columns found".to_string(),
        });
    }

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    let candidate = UploadCandidate {
        file_name,
        file_size: metadata.len(),
        headers,
        path,
    };
    if candidate.exceeds_size_hint() {
        warn!(
            "{} is {:.2} MB, the server may refuse it",
            candidate.file_name,
            candidate.size_mb()
        );
    }
    debug!("Upload candidate: {candidate:?}");
    Ok(candidate)
}

fn is_csv_name(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn sniff_headers(path: &Path) -> Result<Vec<String>, PolarsError> {
    let mut frame = LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .finish()?;
    let schema = frame.collect_schema()?;
    Ok(schema.iter_names().map(|name| name.to_string()).collect())
}
