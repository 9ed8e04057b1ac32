//! Log level and format selection.
//!
//! Sources, later ones winning: `LOGMASK_LOG` (or raw `RUST_LOG`
//! directives when it is unset), `LOGMASK_LOG_FORMAT`, then the
//! `--log-level` / `--log-format` flags.

use clap::ValueEnum;
use std::fmt;

pub const ENV_LOG_LEVEL: &str = "LOGMASK_LOG";
pub const ENV_LOG_FORMAT: &str = "LOGMASK_LOG_FORMAT";

/// Crates whose targets the level applies to.
const LOG_TARGETS: &[&str] = &["logmask", "lm_cli", "lm_config", "lm_scrub", "lm_stream"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Console lines for people
    #[default]
    #[value(aliases = ["console", "pretty"])]
    Human,
    /// One JSON object per line
    #[value(alias = "json")]
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
    #[value(aliases = ["none", "quiet"])]
    Off,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved logging settings for [`super::init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps on human output.
    pub timestamps: bool,
    /// Raw `RUST_LOG` directives; `None` once a level was chosen explicitly.
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::default(),
            timestamps: true,
            directives: None,
        }
    }
}

impl LogConfig {
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = lookup(ENV_LOG_LEVEL).and_then(|v| LogLevel::from_str(v.trim(), true).ok());
        let env_format =
            lookup(ENV_LOG_FORMAT).and_then(|v| LogFormat::from_str(v.trim(), true).ok());

        let mut config = Self::default();
        match cli_level.or(env_level) {
            Some(level) => config.level = level,
            None => config.directives = lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
        }
        config.format = cli_format.or(env_format).unwrap_or_default();
        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.directives = None;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// `EnvFilter` directives: raw `RUST_LOG` if it applies, else the level
    /// for each logmask crate.
    pub fn filter_directives(&self) -> String {
        if let Some(raw) = &self.directives {
            return raw.clone();
        }
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}
