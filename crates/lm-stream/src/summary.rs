//! Batch result aggregation.

use crate::options::{Disposition, ProcessingResult};
use lm_scrub::FileStats;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// A file that failed, with its error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub input_path: PathBuf,
    pub error: String,
}

/// Totals across a batch. Line and match counts cover successful files only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub totals: FileStats,
    /// Mean processing time of successful files, in milliseconds.
    pub average_duration_ms: u64,
    pub failures: Vec<FailedFile>,
}

impl BatchSummary {
    pub fn from_results(results: &[ProcessingResult]) -> Self {
        let mut summary = BatchSummary {
            total_files: results.len(),
            ..Default::default()
        };
        let mut duration_total: u64 = 0;

        for result in results {
            match result.disposition() {
                Disposition::Succeeded => {
                    summary.succeeded += 1;
                    duration_total = duration_total.saturating_add(result.processing_time);
                    if let Some(stats) = &result.stats {
                        summary.totals.merge(stats);
                    }
                }
                Disposition::Failed => {
                    summary.failed += 1;
                    summary.failures.push(FailedFile {
                        input_path: result.input_path.clone(),
                        error: result.error.clone().unwrap_or_default(),
                    });
                }
                Disposition::Cancelled => summary.cancelled += 1,
            }
        }

        if summary.succeeded > 0 {
            summary.average_duration_ms = duration_total / summary.succeeded as u64;
        }
        summary
    }

    /// Whether every file succeeded.
    pub fn is_clean(&self) -> bool {
        self.succeeded == self.total_files
    }

    /// Human-readable multi-line report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Processed {} file(s): {} succeeded, {} failed, {} cancelled",
            self.total_files, self.succeeded, self.failed, self.cancelled
        );
        let _ = writeln!(
            out,
            "Lines: {} total, {} masked, {} errors",
            self.totals.total_lines, self.totals.masked_lines, self.totals.errors
        );
        if !self.totals.pattern_matches.is_empty() {
            let _ = writeln!(out, "Matches:");
            for (name, count) in &self.totals.pattern_matches {
                let _ = writeln!(out, "  {name}: {count}");
            }
        }
        if self.succeeded > 0 {
            let _ = writeln!(out, "Average time per file: {} ms", self.average_duration_ms);
        }
        if !self.failures.is_empty() {
            let _ = writeln!(out, "Failed files:");
            for failure in &self.failures {
                let _ = writeln!(out, "  {}: {}", failure.input_path.display(), failure.error);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    fn stats(total: u64, masked: u64, email: u64) -> FileStats {
        FileStats {
            total_lines: total,
            masked_lines: masked,
            errors: 0,
            pattern_matches: BTreeMap::from([("email".to_string(), email)]),
        }
    }

    #[test]
    fn test_summary_aggregates_successes_only() {
        let results = vec![
            ProcessingResult::succeeded(
                Path::new("/a.log"),
                PathBuf::from("/a.log.masked.log"),
                stats(10, 2, 1),
                Duration::from_millis(10),
            ),
            ProcessingResult::failed(
                Path::new("/b.log"),
                None,
                "file too large",
                Some(stats(99, 99, 99)),
                Duration::from_millis(1),
            ),
            ProcessingResult::succeeded(
                Path::new("/c.log"),
                PathBuf::from("/c.log.masked.log"),
                stats(5, 1, 2),
                Duration::from_millis(30),
            ),
            ProcessingResult::cancelled(Path::new("/d.log"), None, None, Duration::ZERO),
        ];

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.totals.total_lines, 15);
        assert_eq!(summary.totals.masked_lines, 3);
        assert_eq!(summary.totals.pattern_matches["email"], 3);
        assert_eq!(summary.average_duration_ms, 20);
        assert!(!summary.is_clean());

        let text = summary.render();
        assert!(text.contains("4 file(s): 2 succeeded, 1 failed, 1 cancelled"));
        assert!(text.contains("  email: 3"));
        assert!(text.contains("/b.log: file too large"));
        assert!(text.contains("Average time per file: 20 ms"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_results(&[]);
        assert!(summary.is_clean());
        assert!(!summary.render().contains("Average"));
    }
}
