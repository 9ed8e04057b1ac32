//! JSON-aware masking.
//!
//! A line that parses as a JSON object or array is walked recursively instead
//! of being treated as text. Values under sensitive keys are replaced whole,
//! and string leaves are retried as embedded JSON before the `key=value`
//! substring matcher runs on them.

use crate::config::ScrubberConfig;
use crate::{Result, ScrubError};
use serde_json::Value;

/// Maximum nesting walked before the line is treated as an internal fault.
/// JSON embedded in string leaves counts towards the same bound.
pub const MAX_STRUCTURED_DEPTH: usize = 64;

/// Outcome of structured detection on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Structured {
    /// Not JSON; fall through to text mode.
    NotStructured,
    /// JSON, nothing to mask. The caller keeps the original bytes.
    Unchanged,
    /// JSON with masked values, re-serialized.
    Changed(String),
}

pub(crate) fn mask_structured(
    line: &str,
    config: &ScrubberConfig,
    hits: &mut usize,
) -> Result<Structured> {
    match mask_document(line, config, 0, hits)? {
        None => Ok(Structured::NotStructured),
        Some((_, false)) => Ok(Structured::Unchanged),
        Some((value, true)) => Ok(Structured::Changed(serde_json::to_string(&value)?)),
    }
}

fn mask_document(
    text: &str,
    config: &ScrubberConfig,
    depth: usize,
    hits: &mut usize,
) -> Result<Option<(Value, bool)>> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Ok(None);
    }
    let Ok(mut value) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(None);
    };
    let changed = mask_value(&mut value, config, depth, hits)?;
    Ok(Some((value, changed)))
}

fn mask_value(
    value: &mut Value,
    config: &ScrubberConfig,
    depth: usize,
    hits: &mut usize,
) -> Result<bool> {
    if depth > MAX_STRUCTURED_DEPTH {
        return Err(ScrubError::DepthExceeded {
            limit: MAX_STRUCTURED_DEPTH,
        });
    }

    let mask = config.default_mask();
    let mut changed = false;

    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if config.is_sensitive_key(key) {
                    if child.as_str() == Some(mask) {
                        continue;
                    }
                    *child = Value::String(mask.to_string());
                    *hits += 1;
                    changed = true;
                } else if mask_value(child, config, depth + 1, hits)? {
                    changed = true;
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                if mask_value(item, config, depth + 1, hits)? {
                    changed = true;
                }
            }
        }
        Value::String(s) => {
            if let Some(masked) = mask_string_leaf(s, config, depth + 1, hits)? {
                *s = masked;
                changed = true;
            }
        }
        _ => {}
    }

    Ok(changed)
}

fn mask_string_leaf(
    s: &str,
    config: &ScrubberConfig,
    depth: usize,
    hits: &mut usize,
) -> Result<Option<String>> {
    if let Some((inner, changed)) = mask_document(s, config, depth, hits)? {
        return if changed {
            Ok(Some(serde_json::to_string(&inner)?))
        } else {
            Ok(None)
        };
    }

    Ok(config.mask_embedded(s).map(|(masked, n)| {
        *hits += n;
        masked
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(line: &str) -> (Structured, usize) {
        let config = ScrubberConfig::default();
        let mut hits = 0;
        let outcome = mask_structured(line, &config, &mut hits).unwrap();
        (outcome, hits)
    }

    #[test]
    fn test_plain_text_is_not_structured() {
        assert_eq!(run("password=abc").0, Structured::NotStructured);
        assert_eq!(run("{not json").0, Structured::NotStructured);
    }

    #[test]
    fn test_sensitive_key_masked_order_preserved() {
        let (out, hits) = run(r#"{"password":"abc","user":"bob"}"#);
        assert_eq!(
            out,
            Structured::Changed(r#"{"password":"***","user":"bob"}"#.to_string())
        );
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_already_masked_is_unchanged() {
        let (out, hits) = run(r#"{"password": "***", "user": "bob"}"#);
        assert_eq!(out, Structured::Unchanged);
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_non_string_values_masked() {
        let (out, _) = run(r#"{"Token":{"a":1},"pin":1234}"#);
        assert_eq!(out, Structured::Changed(r#"{"Token":"***","pin":1234}"#.to_string()));
    }

    #[test]
    fn test_nested_arrays() {
        let (out, hits) = run(r#"[{"secret":"a"},{"ok":1},[{"pwd":"b"}]]"#);
        assert_eq!(
            out,
            Structured::Changed(r#"[{"secret":"***"},{"ok":1},[{"pwd":"***"}]]"#.to_string())
        );
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_json_in_string_leaf() {
        let (out, _) = run(r#"{"payload":"{\"api_key\":\"xyz\"}"}"#);
        assert_eq!(
            out,
            Structured::Changed(r#"{"payload":"{\"api_key\":\"***\"}"}"#.to_string())
        );
    }

    #[test]
    fn test_embedded_key_value_in_string_leaf() {
        let (out, hits) = run(r#"{"msg":"login password=hunter2 ok"}"#);
        assert_eq!(
            out,
            Structured::Changed(r#"{"msg":"login password=*** ok"}"#.to_string())
        );
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_depth_bound_is_an_error() {
        let depth = MAX_STRUCTURED_DEPTH + 2;
        let line = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let config = ScrubberConfig::default();
        let mut hits = 0;
        let err = mask_structured(&line, &config, &mut hits).unwrap_err();
        assert!(matches!(err, ScrubError::DepthExceeded { .. }));
    }

    #[test]
    fn test_within_depth_bound_is_fine() {
        let depth = MAX_STRUCTURED_DEPTH;
        let line = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        assert_eq!(run(&line).0, Structured::Unchanged);
    }
}
