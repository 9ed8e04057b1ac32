//! Fuzz target for single-line masking.
//!
//! Masking must never panic and must count every line it sees, including
//! lines that are already masked.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lm_scrub::{LineScrubber, ScrubberConfig, ScrubberOptions};
use std::sync::{Arc, OnceLock};

static CONFIG: OnceLock<Arc<ScrubberConfig>> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let config = CONFIG
        .get_or_init(|| Arc::new(ScrubberConfig::from_options(&ScrubberOptions::default())))
        .clone();
    let text = String::from_utf8_lossy(data);
    let line = text.split('\n').next().unwrap_or_default();

    let mut scrubber = LineScrubber::new(config);
    let first = scrubber.process_line(line);
    let _ = scrubber.process_line(&first.masked);
    assert_eq!(scrubber.stats().total_lines, 2);
});
