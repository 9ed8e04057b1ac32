//! Processing options and per-file results.

use lm_scrub::{FileStats, ScrubberOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OUTPUT_SUFFIX: &str = ".masked.log";
pub const DEFAULT_ENCODING: &str = "utf8";
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Concurrency above this is accepted but warned about.
pub const MAX_RECOMMENDED_CONCURRENCY: usize = 16;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024; // 10 GiB
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1024; // 64 KiB

/// Options for a batch (and each file run in it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    /// Output directory. Defaults to each input's own directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    pub output_suffix: String,

    /// Charset label for both input and output.
    pub encoding: String,

    pub concurrency: usize,
    pub skip_binary_files: bool,
    pub max_file_size: u64,

    /// Terminate lines with the platform newline instead of `\n`.
    pub preserve_line_endings: bool,

    /// Read chunk size and write buffer size, in bytes.
    pub high_water_mark: usize,

    pub scrubber_options: ScrubberOptions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            skip_binary_files: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            preserve_line_endings: true,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            scrubber_options: ScrubberOptions::default(),
        }
    }
}

impl ProcessingOptions {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_skip_binary_files(mut self, skip: bool) -> Self {
        self.skip_binary_files = skip;
        self
    }

    pub fn with_preserve_line_endings(mut self, preserve: bool) -> Self {
        self.preserve_line_endings = preserve;
        self
    }

    pub fn with_scrubber_options(mut self, scrubber: ScrubberOptions) -> Self {
        self.scrubber_options = scrubber;
        self
    }

    /// Concurrency clamped to at least one slot.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Chunk size clamped to at least one byte.
    pub fn effective_high_water_mark(&self) -> usize {
        self.high_water_mark.max(1)
    }
}

/// How a file run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of one file run.
///
/// `output_path` is the path the run targets; it names an existing file only
/// when `success` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub input_path: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    pub success: bool,
    pub cancelled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FileStats>,

    /// Wall time in milliseconds.
    pub processing_time: u64,
}

impl ProcessingResult {
    pub fn succeeded(
        input: &Path,
        output: PathBuf,
        stats: FileStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: Some(output),
            success: true,
            cancelled: false,
            error: None,
            stats: Some(stats),
            processing_time: duration_ms(elapsed),
        }
    }

    pub fn failed(
        input: &Path,
        output: Option<PathBuf>,
        error: impl Into<String>,
        stats: Option<FileStats>,
        elapsed: Duration,
    ) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: output,
            success: false,
            cancelled: false,
            error: Some(error.into()),
            stats,
            processing_time: duration_ms(elapsed),
        }
    }

    pub fn cancelled(
        input: &Path,
        output: Option<PathBuf>,
        stats: Option<FileStats>,
        elapsed: Duration,
    ) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: output,
            success: false,
            cancelled: true,
            error: None,
            stats,
            processing_time: duration_ms(elapsed),
        }
    }

    pub fn disposition(&self) -> Disposition {
        if self.success {
            Disposition::Succeeded
        } else if self.cancelled {
            Disposition::Cancelled
        } else {
            Disposition::Failed
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ProcessingOptions::default();
        assert_eq!(opts.output_suffix, ".masked.log");
        assert_eq!(opts.encoding, "utf8");
        assert_eq!(opts.concurrency, 4);
        assert!(opts.skip_binary_files);
        assert_eq!(opts.max_file_size, 10 * 1024 * 1024 * 1024);
        assert!(opts.preserve_line_endings);
        assert_eq!(opts.high_water_mark, 65536);
        assert!(opts.output_dir.is_none());
    }

    #[test]
    fn test_effective_values_clamped() {
        let opts = ProcessingOptions::default()
            .with_concurrency(0)
            .with_high_water_mark(0);
        assert_eq!(opts.effective_concurrency(), 1);
        assert_eq!(opts.effective_high_water_mark(), 1);
    }

    #[test]
    fn test_options_camel_case_partial() {
        let opts: ProcessingOptions =
            serde_json::from_str(r#"{"outputSuffix":".clean","scrubberOptions":{"defaultMask":"X"}}"#)
                .unwrap();
        assert_eq!(opts.output_suffix, ".clean");
        assert_eq!(opts.scrubber_options.default_mask, "X");
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_result_dispositions() {
        let input = Path::new("/logs/a.log");
        let ok = ProcessingResult::succeeded(
            input,
            PathBuf::from("/logs/a.log.masked.log"),
            FileStats::default(),
            Duration::from_millis(12),
        );
        assert_eq!(ok.disposition(), Disposition::Succeeded);
        assert_eq!(ok.processing_time, 12);

        let failed = ProcessingResult::failed(input, None, "boom", None, Duration::ZERO);
        assert_eq!(failed.disposition(), Disposition::Failed);

        let cancelled = ProcessingResult::cancelled(input, None, None, Duration::ZERO);
        assert_eq!(cancelled.disposition(), Disposition::Cancelled);
        assert!(cancelled.error.is_none());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let r = ProcessingResult::cancelled(Path::new("/x"), None, None, Duration::ZERO);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["inputPath"], "/x");
        assert_eq!(json["processingTime"], 0);
        assert!(json.get("error").is_none());
    }
}
