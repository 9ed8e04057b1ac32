//! No-mock settings validation + resolution tests.
//!
//! Covers:
//! - Resolution order (CLI > LOGMASK_CONFIG > LOGMASK_CONFIG_DIR > defaults)
//! - Save/load through real files
//! - Validation of loaded options

use lm_config::resolve::{resolve_config, ConfigSource, ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use lm_config::{
    default_settings_path, load_settings, save_settings, validate_options, ValidationError,
};
use lm_stream::ProcessingOptions;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|p| p.into_inner());
    f()
}

fn write_settings(path: &Path, json: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create settings parent");
    }
    fs::write(path, json).expect("write settings");
}

#[test]
fn test_cli_path_overrides_environment() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let tmp = TempDir::new().unwrap();
        let env_file = tmp.path().join("env.json");
        let cli_file = tmp.path().join("cli.json");
        write_settings(&env_file, r#"{"concurrency": 2}"#);
        write_settings(&cli_file, r#"{"concurrency": 3}"#);
        env::set_var(ENV_CONFIG_PATH, &env_file);

        let paths = resolve_config(Some(&cli_file));
        assert_eq!(paths.source, ConfigSource::CliArgument);
        let loaded = load_settings(&paths).unwrap();
        assert_eq!(loaded.options.concurrency, 3);
    });
}

#[test]
fn test_env_path_then_config_dir() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cfg");
        write_settings(&dir.join("settings.json"), r#"{"encoding": "gbk"}"#);
        env::set_var(ENV_CONFIG_DIR, &dir);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.json"));
        let paths = resolve_config(None);
        assert_eq!(paths.source, ConfigSource::ConfigDirEnvironment);
        assert_eq!(load_settings(&paths).unwrap().options.encoding, "gbk");

        let direct = tmp.path().join("direct.json");
        write_settings(&direct, r#"{"encoding": "latin1"}"#);
        env::set_var(ENV_CONFIG_PATH, &direct);
        let paths = resolve_config(None);
        assert_eq!(paths.source, ConfigSource::Environment);
        assert_eq!(load_settings(&paths).unwrap().options.encoding, "latin1");

        assert_eq!(default_settings_path(), Some(dir.join("settings.json")));
    });
}

#[test]
fn test_missing_cli_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let paths = resolve_config(Some(&tmp.path().join("nope.json")));
    let err = load_settings(&paths).unwrap_err();
    assert!(matches!(err, ValidationError::IoError(_)));
    assert_eq!(err.code(), 60);
}

#[test]
fn test_save_then_load_preserves_options() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("settings.json");

    let mut options = ProcessingOptions::default()
        .with_concurrency(6)
        .with_suffix(".redacted")
        .with_encoding("gbk")
        .with_output_dir("/srv/masked");
    options.scrubber_options.default_mask = "[HIDDEN]".to_string();
    options.scrubber_options.extra_sensitive_keys = vec!["pin".to_string()];
    options
        .scrubber_options
        .pattern_toggles
        .insert("ipv4".to_string(), false);

    save_settings(&path, &options).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("{\n  \"schemaVersion\": \"1.0.0\""));

    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let paths = resolve_config(Some(&path));
    let loaded = load_settings(&paths).unwrap();
    assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);
    assert_eq!(loaded.options, options);
}

#[test]
fn test_tolerant_load_then_validate() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("settings.json");
    write_settings(
        &path,
        r#"{
            "concurrency": 0,
            "highWaterMark": "big",
            "scrubberOptions": {
                "customPatterns": [
                    {"name": "order", "regex": "ORD-[0-9]+"},
                    {"name": "broken", "regex": 42}
                ]
            }
        }"#,
    );

    let loaded = load_settings(&resolve_config(Some(&path))).unwrap();
    let fields: Vec<&str> = loaded.diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["highWaterMark", "scrubberOptions.customPatterns[1]"]);
    assert_eq!(loaded.options.scrubber_options.custom_patterns.len(), 1);
    assert_eq!(loaded.options.high_water_mark, 64 * 1024);

    let err = validate_options(&loaded.options).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "concurrency"));
}
