//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

use kiosk_media::{ErrorCategory, MediaError};
use kiosk_models::TimingError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Failed to read style file {path}: {source}")]
    StyleFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid style JSON: {0}")]
    StyleJson(#[from] serde_json::Error),

    #[error("Invalid timing: {0}")]
    Timing(#[from] TimingError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl WorkerError {
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Category reported to the caller.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::Media(e) => e.category(),
            WorkerError::InvalidArgs(_)
            | WorkerError::StyleFile { .. }
            | WorkerError::StyleJson(_)
            | WorkerError::Timing(_) => ErrorCategory::InvalidInput,
        }
    }

    /// Process exit code, distinct per category.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::InvalidInput => 2,
            ErrorCategory::Timeout => 3,
            ErrorCategory::Encoding => 4,
            ErrorCategory::MissingAsset => 5,
        }
    }
}
