//! Line scrubber.
//!
//! The LineScrubber applies a [`ScrubberConfig`] to one line at a time and
//! keeps the statistics for the file it is bound to. It never returns an
//! error: any fault while masking a line replaces that line with the mask.

use crate::catalog::{SENSITIVE_KEY_RULE, URL_WITH_PARAMS};
use crate::config::ScrubberConfig;
use crate::stats::{FileStats, LineResult};
use crate::structured::{mask_structured, Structured};
use crate::{Result, ScrubError};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Per-file line scrubber.
#[derive(Debug)]
pub struct LineScrubber {
    config: Arc<ScrubberConfig>,
    stats: FileStats,
}

impl LineScrubber {
    pub fn new(config: Arc<ScrubberConfig>) -> Self {
        Self {
            config,
            stats: FileStats::default(),
        }
    }

    /// Scrubber over the built-in catalog and default options.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ScrubberConfig::default()))
    }

    pub fn config(&self) -> &ScrubberConfig {
        &self.config
    }

    /// Scrub one line (without its terminator).
    pub fn process_line(&mut self, line: &str) -> LineResult {
        self.stats.total_lines += 1;

        if !self.config.enable_masking() {
            return LineResult::unchanged(line);
        }

        let config = &self.config;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| mask_line(config, line)));

        let result = match outcome {
            Ok(Ok((masked, matches))) => LineResult::new(line, masked, matches),
            Ok(Err(err)) => {
                tracing::debug!(line = self.stats.total_lines, error = %err, "line masked wholesale");
                LineResult::fail_closed(line, config.default_mask(), err.to_string())
            }
            Err(_) => {
                let err = ScrubError::internal();
                tracing::warn!(line = self.stats.total_lines, "rule panicked; line masked wholesale");
                LineResult::fail_closed(line, config.default_mask(), err.to_string())
            }
        };

        self.stats.record(&result);
        result
    }

    /// Scrub a block of text line by line, keeping `\n` terminators.
    pub fn scrub_text(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&self.process_line(line).masked);
        }
        out
    }

    pub fn stats(&self) -> &FileStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = FileStats::default();
    }

    pub fn into_stats(self) -> FileStats {
        self.stats
    }
}

fn mask_line(config: &ScrubberConfig, line: &str) -> Result<(String, BTreeMap<String, usize>)> {
    let mut matches = BTreeMap::new();
    let mut key_hits = 0usize;

    let mut current: Cow<'_, str> = match mask_structured(line, config, &mut key_hits)? {
        Structured::Changed(s) => Cow::Owned(s),
        Structured::Unchanged => Cow::Borrowed(line),
        Structured::NotStructured => {
            let mut text = Cow::Borrowed(line);
            if let Some((masked, n)) = config.mask_kv_pairs(&text) {
                key_hits += n;
                text = Cow::Owned(masked);
            }
            if let Some((masked, n)) = config.mask_keywords(&text) {
                key_hits += n;
                text = Cow::Owned(masked);
            }
            text
        }
    };

    if key_hits > 0 {
        matches.insert(SENSITIVE_KEY_RULE.to_string(), key_hits);
    }

    for pattern in config.patterns() {
        if pattern.name == URL_WITH_PARAMS && !config.mask_url_params() {
            continue;
        }
        if let Some((masked, n)) = pattern.apply(&current, config.default_mask()) {
            if masked != *current {
                *matches.entry(pattern.name.clone()).or_default() += n;
                current = Cow::Owned(masked);
            }
        }
    }

    Ok((current.into_owned(), matches))
}
