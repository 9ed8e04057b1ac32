//! Structured logging for the logmask binary.
//!
//! Human output for interactive use, JSONL for automation. All logs go to
//! stderr; stdout carries only command payloads.
//!
//! # Environment Variables
//!
//! - `LOGMASK_LOG`: level (trace, debug, info, warn, error, off)
//! - `RUST_LOG`: raw filter directives, used when `LOGMASK_LOG` is unset
//! - `LOGMASK_LOG_FORMAT`: output format (human, jsonl)

mod config;
mod layer;

pub use config::{LogConfig, LogFormat, LogLevel, ENV_LOG_FORMAT, ENV_LOG_LEVEL};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use std::sync::{Arc, OnceLock, RwLock};

use lm_scrub::{LineScrubber, ScrubberConfig, ScrubberOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_SCRUBBER: OnceLock<RwLock<Arc<ScrubberConfig>>> = OnceLock::new();

fn scrubber_slot() -> &'static RwLock<Arc<ScrubberConfig>> {
    LOG_SCRUBBER.get_or_init(|| {
        RwLock::new(Arc::new(ScrubberConfig::from_options(
            &ScrubberOptions::default(),
        )))
    })
}

/// Replace the scrubber applied to JSONL log output, usually with the one
/// built from the loaded settings.
pub fn set_log_scrubber(config: Arc<ScrubberConfig>) {
    let mut slot = scrubber_slot()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = config;
}

/// The scrubber currently applied to log output.
pub fn log_scrubber() -> Arc<ScrubberConfig> {
    scrubber_slot()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

pub(crate) fn scrub_for_log(value: &str) -> String {
    LineScrubber::new(log_scrubber()).scrub_text(value)
}

/// Initialize the global tracing subscriber. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.filter_directives())
        .unwrap_or_else(|_| EnvFilter::new(format!("logmask={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init();
            } else {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init();
            }
        }
        LogFormat::Jsonl => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(JsonlLayer::stderr())
                .try_init();
        }
    }
}
