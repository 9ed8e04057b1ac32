//! Log line masking engine.
//!
//! This crate rewrites individual log lines so that credentials, tokens and
//! personal identifiers never leave the machine in clear text.
//!
//! # Key Features
//!
//! - **Key-aware masking**: values under sensitive keys (`password`, `token`,
//!   ...) are masked in JSON documents and in `key=value` text alike.
//! - **Shape detection**: an ordered catalog of regex rules (JWTs, cloud keys,
//!   emails, phone and card numbers, IPs, URL query strings) with literal or
//!   computed replacements.
//! - **Tolerant configuration**: loosely typed options are normalized once;
//!   unusable rules are dropped with diagnostics instead of failing.
//! - **Fail-closed**: a fault while masking a line replaces the whole line
//!   with the mask and is counted; the next line is processed normally.
//!
//! # Example
//!
//! ```
//! use lm_scrub::LineScrubber;
//!
//! let mut scrubber = LineScrubber::with_defaults();
//! let result = scrubber.process_line("login ok password=hunter2");
//! assert_eq!(result.masked, "login ok password=***");
//! assert_eq!(scrubber.stats().masked_lines, 1);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod scrubber;
pub mod stats;
pub mod structured;

pub use catalog::{
    builtin_pattern_names, Pattern, PatternCatalog, PatternCategory, PatternInfo, Replacement,
    SensitiveKeySet, DEFAULT_SENSITIVE_KEYS, SENSITIVE_KEY_RULE, URL_WITH_PARAMS,
};
pub use config::{
    ConfigDiagnostic, CustomPatternSpec, NormalizedConfig, ScrubberConfig, ScrubberOptions,
    DEFAULT_KV_SEPARATORS, DEFAULT_MASK,
};
pub use error::{Result, ScrubError};
pub use scrubber::LineScrubber;
pub use stats::{FileStats, LineResult};
pub use structured::MAX_STRUCTURED_DEPTH;
