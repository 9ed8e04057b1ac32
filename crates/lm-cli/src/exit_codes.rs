//! Exit codes for the logmask CLI.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use lm_stream::BatchSummary;

/// Exit codes for logmask operations. These are a stable contract for
/// automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every file succeeded.
    Clean = 0,

    /// At least one file failed; the others were processed.
    PartialFail = 3,

    /// The job was cancelled (Ctrl-C).
    Interrupted = 6,

    /// Invalid arguments or settings.
    ArgsError = 10,

    /// Internal error (bug, please report).
    InternalError = 20,

    /// I/O error outside per-file processing.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Outcome of a finished batch. Cancellation wins over failures.
    pub fn for_summary(summary: &BatchSummary) -> Self {
        if summary.cancelled > 0 {
            ExitCode::Interrupted
        } else if summary.failed > 0 {
            ExitCode::PartialFail
        } else {
            ExitCode::Clean
        }
    }

    /// Codes 0-9 describe how the run went, not an error.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::Interrupted => "ERR_INTERRUPTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_operational());
        assert!(ExitCode::Interrupted.is_operational());
        assert!(ExitCode::ArgsError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert_eq!(ExitCode::PartialFail.to_string(), "ERR_PARTIAL (3)");
    }

    #[test]
    fn test_for_summary() {
        let mut summary = BatchSummary {
            total_files: 3,
            succeeded: 3,
            ..Default::default()
        };
        assert_eq!(ExitCode::for_summary(&summary), ExitCode::Clean);
        summary.succeeded = 2;
        summary.failed = 1;
        assert_eq!(ExitCode::for_summary(&summary), ExitCode::PartialFail);
        summary.failed = 0;
        summary.cancelled = 1;
        assert_eq!(ExitCode::for_summary(&summary), ExitCode::Interrupted);
    }
}
