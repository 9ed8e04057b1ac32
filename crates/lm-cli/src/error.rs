//! Errors surfaced by CLI commands.

use crate::exit_codes::ExitCode;
use lm_config::ValidationError;
use lm_stream::BatchError;
use std::io;
use thiserror::Error;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("settings: {0}")]
    Config(#[from] ValidationError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("{0}")]
    Usage(String),

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        CliError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::Usage(_) => ExitCode::ArgsError,
            CliError::Io { .. } => ExitCode::IoError,
            CliError::Batch(_) | CliError::Output(_) => ExitCode::InternalError,
        }
    }
}
