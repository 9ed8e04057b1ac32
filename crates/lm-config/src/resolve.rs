//! Settings file resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

/// Discovered settings file location.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to settings.json (or None when running on built-in defaults).
    pub settings: Option<PathBuf>,

    /// Where the path came from (for diagnostics).
    pub source: ConfigSource,
}

/// Where a settings file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via `--config`.
    CliArgument,

    /// Set via `LOGMASK_CONFIG`.
    Environment,

    /// Found under `LOGMASK_CONFIG_DIR`.
    ConfigDirEnvironment,

    /// Found in the XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigDirEnvironment => write!(f, "config dir variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

pub const ENV_CONFIG_PATH: &str = "LOGMASK_CONFIG";
pub const ENV_CONFIG_DIR: &str = "LOGMASK_CONFIG_DIR";

pub const SETTINGS_FILENAME: &str = "settings.json";

/// Application name for XDG directories.
const APP_NAME: &str = "logmask";

/// Resolve the settings file.
///
/// 1. Explicit CLI path, taken as-is even if missing so loading reports it
/// 2. `LOGMASK_CONFIG` (direct path, if it exists)
/// 3. `LOGMASK_CONFIG_DIR/settings.json` (if it exists)
/// 4. `~/.config/logmask/settings.json` (if it exists)
/// 5. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        return ConfigPaths {
            settings: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Some(path) = env_path(ENV_CONFIG_PATH) {
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Some(dir) = env_path(ENV_CONFIG_DIR) {
        let path = dir.join(SETTINGS_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::ConfigDirEnvironment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(SETTINGS_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::XdgConfig);
        }
    }

    ConfigPaths::default()
}

fn found(path: PathBuf, source: ConfigSource) -> ConfigPaths {
    ConfigPaths {
        settings: Some(path),
        source,
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Where `config init` writes when no path is given: the config dir from
/// the environment, else the XDG config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    env_path(ENV_CONFIG_DIR)
        .or_else(xdg_config_dir)
        .map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Get the XDG config directory for logmask.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}
