//! Error types for the streaming pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that end a single file run.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("file is not readable: {}", .0.display())]
    Unreadable(PathBuf),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("binary file skipped: {}", .0.display())]
    Binary(PathBuf),

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid input path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal state, not a failure. Never rendered as result error text.
    #[error("cancelled")]
    Cancelled,
}

impl StreamError {
    /// Whether the error was raised before any output stream was opened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StreamError::NotFound(_)
                | StreamError::NotAFile(_)
                | StreamError::Unreadable(_)
                | StreamError::TooLarge { .. }
                | StreamError::Binary(_)
                | StreamError::UnsupportedEncoding(_)
                | StreamError::InvalidPath(_)
        )
    }
}

/// Errors from the batch coordinator itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("a batch job is already active")]
    JobActive,
}
