//! Fuzz target for settings parsing.
//!
//! Arbitrary JSON must load tolerantly (diagnostics, not panics) and the
//! resulting scrubber options must normalize into a usable config.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lm_config::{parse_settings, validate_options};
use lm_scrub::{LineScrubber, ScrubberConfig};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((options, _diagnostics)) = parse_settings(text) else {
        return;
    };
    let _ = validate_options(&options);

    let normalized = ScrubberConfig::build(&options.scrubber_options);
    let mut scrubber = LineScrubber::new(Arc::new(normalized.config));
    let _ = scrubber.process_line("user=alice password=hunter2 mail=a@b.co");
});
