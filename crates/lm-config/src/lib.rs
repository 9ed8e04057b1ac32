//! logmask settings loading and validation.
//!
//! This crate provides:
//! - Settings file resolution (CLI → env → XDG → defaults)
//! - Tolerant loading into [`lm_stream::ProcessingOptions`] with diagnostics
//! - Semantic validation and atomic saving

pub mod resolve;
pub mod settings;
pub mod validate;

pub use resolve::{default_settings_path, resolve_config, ConfigPaths, ConfigSource};
pub use settings::{
    load_settings, parse_settings, read_settings, save_settings, settings_document, LoadedSettings,
};
pub use validate::{validate_options, ValidationError, ValidationResult};

/// Schema version written into settings files.
pub const SETTINGS_SCHEMA_VERSION: &str = "1.0.0";
