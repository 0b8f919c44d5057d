//! Error types for media operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use kiosk_models::TimingError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A stage exceeded its time budget; shorter clips may help
    Timeout,
    /// Source file unreadable, empty or too small
    InvalidInput,
    /// The encoder failed for reasons other than timeout
    Encoding,
    /// An optional asset was not found
    MissingAsset,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Encoding => "encoding",
            ErrorCategory::MissingAsset => "missing_asset",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Stage '{stage}' timed out after {timeout_ms} ms")]
    Timeout { stage: String, timeout_ms: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Missing asset: {0}")]
    MissingAsset(String),

    #[error("All strategies failed ({}): {source}", .attempted.join(" -> "))]
    StrategiesExhausted {
        attempted: Vec<String>,
        #[source]
        source: Box<MediaError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a timeout error for a stage.
    pub fn timeout(stage: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            timeout_ms,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a missing asset error.
    pub fn missing_asset(message: impl Into<String>) -> Self {
        Self::MissingAsset(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Category reported to the caller.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Timeout { .. } => ErrorCategory::Timeout,
            MediaError::InvalidInput(_) | MediaError::FileNotFound(_) => {
                ErrorCategory::InvalidInput
            }
            MediaError::MissingAsset(_) => ErrorCategory::MissingAsset,
            MediaError::StrategiesExhausted { source, .. } => source.category(),
            MediaError::FfmpegNotFound(_)
            | MediaError::FfprobeNotFound(_)
            | MediaError::FfmpegFailed { .. }
            | MediaError::FfprobeFailed { .. }
            | MediaError::Io(_)
            | MediaError::JsonParse(_)
            | MediaError::Internal(_) => ErrorCategory::Encoding,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.category() == ErrorCategory::Timeout
    }
}

impl From<TimingError> for MediaError {
    fn from(e: TimingError) -> Self {
        MediaError::InvalidInput(e.to_string())
    }
}
