//! Settings validation errors and semantic validation.

use lm_scrub::DEFAULT_KV_SEPARATORS;
use lm_stream::{Charset, ProcessingOptions, MAX_RECOMMENDED_CONCURRENCY};
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Settings validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate processing options semantically.
///
/// Returns non-fatal warnings on success.
pub fn validate_options(options: &ProcessingOptions) -> ValidationResult<Vec<String>> {
    let mut warnings = Vec::new();

    if options.concurrency == 0 {
        return Err(ValidationError::invalid("concurrency", "Must be at least 1, got 0"));
    }
    if options.concurrency > MAX_RECOMMENDED_CONCURRENCY {
        warnings.push(format!(
            "concurrency {} is above the recommended maximum of {}",
            options.concurrency, MAX_RECOMMENDED_CONCURRENCY
        ));
    }

    if options.output_suffix.is_empty() {
        return Err(ValidationError::invalid(
            "outputSuffix",
            "Must not be empty (output would overwrite the input)",
        ));
    }
    if options.output_suffix.contains(['/', '\\']) {
        return Err(ValidationError::invalid(
            "outputSuffix",
            format!("Must not contain path separators, got {:?}", options.output_suffix),
        ));
    }

    if options.high_water_mark == 0 {
        return Err(ValidationError::invalid("highWaterMark", "Must be positive, got 0"));
    }
    if options.max_file_size == 0 {
        return Err(ValidationError::invalid("maxFileSize", "Must be positive, got 0"));
    }

    if let Err(err) = Charset::resolve(&options.encoding) {
        return Err(ValidationError::invalid("encoding", err.to_string()));
    }

    let scrubber = &options.scrubber_options;
    if scrubber.default_mask.is_empty() {
        return Err(ValidationError::invalid(
            "scrubberOptions.defaultMask",
            "Must not be empty",
        ));
    }
    if scrubber.kv_separators.iter().all(|s| s.is_empty()) {
        warnings.push(format!(
            "scrubberOptions.kvSeparators has no usable separator; falling back to {:?}",
            DEFAULT_KV_SEPARATORS
        ));
    }
    if !scrubber.enable_masking {
        warnings.push("scrubberOptions.enableMasking is false; pattern rules are skipped".to_string());
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_scrub::ScrubberConfig;

    #[test]
    fn test_defaults_are_valid() {
        let warnings = validate_options(&ProcessingOptions::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_rejections() {
        let cases = [
            ProcessingOptions::default().with_concurrency(0),
            ProcessingOptions::default().with_suffix(""),
            ProcessingOptions::default().with_suffix("/x"),
            ProcessingOptions::default().with_high_water_mark(0),
            ProcessingOptions::default().with_max_file_size(0),
            ProcessingOptions::default().with_encoding("no-such-charset"),
        ];
        for options in cases {
            let err = validate_options(&options).unwrap_err();
            assert_eq!(err.code(), 65, "{err}");
        }
    }

    #[test]
    fn test_empty_mask_rejected() {
        let mut options = ProcessingOptions::default();
        options.scrubber_options.default_mask.clear();
        let err = validate_options(&options).unwrap_err();
        assert!(err.to_string().contains("defaultMask"));
    }

    #[test]
    fn test_empty_separators_warn_about_fallback() {
        let mut options = ProcessingOptions::default();
        options.scrubber_options.kv_separators = vec![String::new()];
        let warnings = validate_options(&options).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("falling back"));
        assert!(!warnings[0].contains("off"));

        let config = ScrubberConfig::from_options(&options.scrubber_options);
        assert_eq!(config.kv_separators().len(), DEFAULT_KV_SEPARATORS.len());
    }

    #[test]
    fn test_high_concurrency_warns() {
        let warnings = validate_options(&ProcessingOptions::default().with_concurrency(64)).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("64"));
    }
}
