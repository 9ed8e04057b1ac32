//! Settings file loading and saving.
//!
//! The file is a JSON object with the shape of [`ProcessingOptions`]
//! (camelCase) plus an optional `schemaVersion`. Loading is tolerant: every
//! field is normalized on its own and a field of the wrong type is dropped
//! with a diagnostic instead of failing the whole file.

use crate::resolve::{ConfigPaths, ConfigSource};
use crate::validate::{ValidationError, ValidationResult};
use crate::SETTINGS_SCHEMA_VERSION;
use lm_scrub::{ConfigDiagnostic, ScrubberOptions};
use lm_stream::ProcessingOptions;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Settings as loaded, with provenance and everything that was dropped.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub options: ProcessingOptions,
    pub diagnostics: Vec<ConfigDiagnostic>,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

impl LoadedSettings {
    /// Built-in defaults, no file involved.
    pub fn builtin() -> Self {
        Self {
            options: ProcessingOptions::default(),
            diagnostics: Vec::new(),
            path: None,
            source: ConfigSource::BuiltinDefault,
        }
    }
}

/// Load the resolved settings file, or defaults when none was found.
pub fn load_settings(paths: &ConfigPaths) -> ValidationResult<LoadedSettings> {
    let Some(path) = &paths.settings else {
        return Ok(LoadedSettings::builtin());
    };
    let (options, diagnostics) = read_settings(path)?;
    for diag in &diagnostics {
        tracing::warn!(path = %path.display(), field = %diag.field, "settings field dropped: {}", diag.message);
    }
    Ok(LoadedSettings {
        options,
        diagnostics,
        path: Some(path.clone()),
        source: paths.source,
    })
}

/// Read and normalize one settings file.
pub fn read_settings(path: &Path) -> ValidationResult<(ProcessingOptions, Vec<ConfigDiagnostic>)> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_settings(&content)
}

/// Parse settings JSON tolerantly.
pub fn parse_settings(json: &str) -> ValidationResult<(ProcessingOptions, Vec<ConfigDiagnostic>)> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))?;
    let map = value
        .as_object()
        .ok_or_else(|| ValidationError::ParseError("settings must be a JSON object".to_string()))?;

    if let Some(version) = map.get("schemaVersion") {
        if version.as_str() != Some(SETTINGS_SCHEMA_VERSION) {
            return Err(ValidationError::VersionMismatch {
                expected: SETTINGS_SCHEMA_VERSION.to_string(),
                actual: version
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| version.to_string()),
            });
        }
    }

    Ok(options_from_map(map))
}

fn options_from_map(map: &Map<String, Value>) -> (ProcessingOptions, Vec<ConfigDiagnostic>) {
    let mut options = ProcessingOptions::default();
    let mut diags = Vec::new();

    for (key, value) in map {
        match key.as_str() {
            "schemaVersion" => {}
            "outputDir" => match value {
                Value::Null => options.output_dir = None,
                Value::String(s) if !s.is_empty() => options.output_dir = Some(PathBuf::from(s)),
                _ => diags.push(ConfigDiagnostic::new(key, "expected a non-empty path string")),
            },
            "outputSuffix" => string_field(key, value, &mut options.output_suffix, &mut diags),
            "encoding" => string_field(key, value, &mut options.encoding, &mut diags),
            "concurrency" => match value.as_u64() {
                Some(n) => options.concurrency = usize::try_from(n).unwrap_or(usize::MAX),
                None => diags.push(ConfigDiagnostic::new(key, "expected a non-negative integer")),
            },
            "skipBinaryFiles" => bool_field(key, value, &mut options.skip_binary_files, &mut diags),
            "maxFileSize" => match value.as_u64() {
                Some(n) => options.max_file_size = n,
                None => diags.push(ConfigDiagnostic::new(key, "expected a byte count")),
            },
            "preserveLineEndings" => {
                bool_field(key, value, &mut options.preserve_line_endings, &mut diags)
            }
            "highWaterMark" => match value.as_u64() {
                Some(n) => options.high_water_mark = usize::try_from(n).unwrap_or(usize::MAX),
                None => diags.push(ConfigDiagnostic::new(key, "expected a byte count")),
            },
            "scrubberOptions" => {
                let (scrubber, scrub_diags) = ScrubberOptions::from_value(value);
                options.scrubber_options = scrubber;
                diags.extend(scrub_diags.into_iter().map(|d| {
                    if d.field.starts_with("scrubberOptions") {
                        d
                    } else {
                        ConfigDiagnostic::new(format!("scrubberOptions.{}", d.field), d.message)
                    }
                }));
            }
            _ => diags.push(ConfigDiagnostic::new(key, "unknown field; ignored")),
        }
    }

    (options, diags)
}

fn string_field(key: &str, value: &Value, slot: &mut String, diags: &mut Vec<ConfigDiagnostic>) {
    match value.as_str() {
        Some(s) => *slot = s.to_string(),
        None => diags.push(ConfigDiagnostic::new(key, "expected a string")),
    }
}

fn bool_field(key: &str, value: &Value, slot: &mut bool, diags: &mut Vec<ConfigDiagnostic>) {
    match value.as_bool() {
        Some(b) => *slot = b,
        None => diags.push(ConfigDiagnostic::new(key, "expected a boolean")),
    }
}

/// Render options as the settings document, `schemaVersion` first.
pub fn settings_document(options: &ProcessingOptions) -> ValidationResult<Value> {
    let body = serde_json::to_value(options)
        .map_err(|e| ValidationError::ParseError(format!("Failed to serialize settings: {}", e)))?;
    let mut doc = Map::new();
    doc.insert(
        "schemaVersion".to_string(),
        Value::String(SETTINGS_SCHEMA_VERSION.to_string()),
    );
    if let Value::Object(fields) = body {
        doc.extend(fields);
    }
    Ok(Value::Object(doc))
}

/// Write `options` as pretty JSON through a sibling temp file and rename.
pub fn save_settings(path: &Path, options: &ProcessingOptions) -> ValidationResult<()> {
    let doc = settings_document(options)?;
    let mut content = serde_json::to_string_pretty(&doc)
        .map_err(|e| ValidationError::ParseError(format!("Failed to serialize settings: {}", e)))?;
    content.push('\n');

    let io_err = |what: &str, p: &Path, e: std::io::Error| {
        ValidationError::IoError(format!("Failed to {} {}: {}", what, p.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create", parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::resolve::SETTINGS_FILENAME.to_string());
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    std::fs::write(&temp, content).map_err(|e| io_err("write", &temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(io_err("replace", path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_settings() {
        let (options, diags) = parse_settings(
            r#"{"concurrency": 8, "outputSuffix": ".clean", "scrubberOptions": {"defaultMask": "[X]"}}"#,
        )
        .unwrap();
        assert!(diags.is_empty());
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.output_suffix, ".clean");
        assert_eq!(options.scrubber_options.default_mask, "[X]");
        assert_eq!(options.encoding, "utf8");
    }

    #[test]
    fn test_wrong_types_dropped_with_diagnostics() {
        let (options, diags) = parse_settings(
            r#"{"concurrency": "many", "skipBinaryFiles": 1, "bogus": true,
                "scrubberOptions": {"enableMasking": "yes"}}"#,
        )
        .unwrap();
        assert_eq!(options.concurrency, 4);
        assert!(options.skip_binary_files);
        assert!(options.scrubber_options.enable_masking);

        let fields: Vec<&str> = diags.iter().map(|d| d.field.as_str()).collect();
        assert!(fields.contains(&"concurrency"));
        assert!(fields.contains(&"skipBinaryFiles"));
        assert!(fields.contains(&"bogus"));
        assert!(fields.contains(&"scrubberOptions.enableMasking"));
    }

    #[test]
    fn test_not_an_object() {
        let err = parse_settings("[1, 2]").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
        let err = parse_settings("{nope").unwrap_err();
        assert_eq!(err.code(), 61);
    }

    #[test]
    fn test_schema_version_checked() {
        assert!(parse_settings(r#"{"schemaVersion": "1.0.0"}"#).is_ok());
        let err = parse_settings(r#"{"schemaVersion": "9.9.9"}"#).unwrap_err();
        assert!(matches!(err, ValidationError::VersionMismatch { .. }));
    }

    #[test]
    fn test_document_starts_with_schema_version() {
        let doc = settings_document(&ProcessingOptions::default()).unwrap();
        let first = doc.as_object().unwrap().keys().next().cloned();
        assert_eq!(first.as_deref(), Some("schemaVersion"));
        assert_eq!(doc["concurrency"], 4);
    }
}
