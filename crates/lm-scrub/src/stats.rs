//! Per-line results and per-file statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of scrubbing one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    pub original: String,
    pub masked: String,

    /// True when `masked` differs from `original`, or the line was masked
    /// wholesale after a fault.
    pub has_changes: bool,

    /// Rule name → number of matches on this line.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub matches: BTreeMap<String, usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LineResult {
    pub(crate) fn new(original: &str, masked: String, matches: BTreeMap<String, usize>) -> Self {
        Self {
            has_changes: masked != original,
            original: original.to_string(),
            masked,
            matches,
            error: None,
        }
    }

    /// A line passed through verbatim.
    pub(crate) fn unchanged(original: &str) -> Self {
        Self::new(original, original.to_string(), BTreeMap::new())
    }

    /// A line replaced wholesale with the mask after an internal fault.
    pub(crate) fn fail_closed(original: &str, mask: &str, error: String) -> Self {
        Self {
            original: original.to_string(),
            masked: mask.to_string(),
            has_changes: true,
            matches: BTreeMap::new(),
            error: Some(error),
        }
    }
}

/// Counters for one file. Monotonic until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total_lines: u64,
    pub masked_lines: u64,
    pub errors: u64,
    pub pattern_matches: BTreeMap<String, u64>,
}

impl FileStats {
    /// Fold another file's counters into this one.
    pub fn merge(&mut self, other: &FileStats) {
        self.total_lines += other.total_lines;
        self.masked_lines += other.masked_lines;
        self.errors += other.errors;
        for (name, count) in &other.pattern_matches {
            *self.pattern_matches.entry(name.clone()).or_default() += count;
        }
    }

    pub(crate) fn record(&mut self, result: &LineResult) {
        if result.has_changes {
            self.masked_lines += 1;
        }
        if result.error.is_some() {
            self.errors += 1;
        }
        for (name, count) in &result.matches {
            *self.pattern_matches.entry(name.clone()).or_default() += *count as u64;
        }
    }

    /// Total pattern hits across all rules.
    pub fn total_matches(&self) -> u64 {
        self.pattern_matches.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_changes_tracks_difference() {
        assert!(!LineResult::unchanged("abc").has_changes);
        assert!(LineResult::new("abc", "a**".into(), BTreeMap::new()).has_changes);
    }

    #[test]
    fn test_fail_closed_forces_change() {
        let r = LineResult::fail_closed("***", "***", "boom".into());
        assert!(r.has_changes);
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_merge_sums_counters() {
        let mut a = FileStats {
            total_lines: 3,
            masked_lines: 1,
            errors: 0,
            pattern_matches: BTreeMap::from([("email".to_string(), 2)]),
        };
        let b = FileStats {
            total_lines: 5,
            masked_lines: 2,
            errors: 1,
            pattern_matches: BTreeMap::from([("email".to_string(), 1), ("ipv4".to_string(), 4)]),
        };
        a.merge(&b);
        assert_eq!(a.total_lines, 8);
        assert_eq!(a.masked_lines, 3);
        assert_eq!(a.errors, 1);
        assert_eq!(a.pattern_matches["email"], 3);
        assert_eq!(a.pattern_matches["ipv4"], 4);
        assert_eq!(a.total_matches(), 7);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(FileStats::default()).unwrap();
        assert!(json.get("totalLines").is_some());
        assert!(json.get("patternMatches").is_some());
    }
}
