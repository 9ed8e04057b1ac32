//! Error types for the masking engine.

use thiserror::Error;

/// Result type for scrubbing operations.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Errors that can occur while building or applying masking rules.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// A rule's regex failed to compile.
    #[error("pattern error in '{name}': {source}")]
    PatternError {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A configuration field was unusable.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Structured content nested past the recursion bound.
    #[error("structured content nested deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    /// JSON re-serialization failed.
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Internal error that should never expose raw data.
    /// The message is sanitized to prevent secret leakage.
    #[error("internal error (details redacted for safety)")]
    InternalError,
}

impl ScrubError {
    /// Create an internal error, ensuring no line content is exposed.
    pub fn internal() -> Self {
        ScrubError::InternalError
    }

    /// Build a pattern error for a named rule.
    pub fn pattern(name: impl Into<String>, source: regex::Error) -> Self {
        ScrubError::PatternError {
            name: name.into(),
            source,
        }
    }
}
