//! Scrubber options and their normalized, compiled form.
//!
//! [`ScrubberOptions`] is the loosely typed object a shell persists and hands
//! over. [`ScrubberConfig::build`] is the single normalization step that turns
//! it into a well-typed configuration with compiled matchers. Unusable fields
//! are dropped with a [`ConfigDiagnostic`]; building never fails.

use crate::catalog::{
    builtin_patterns, Pattern, PatternCatalog, PatternCategory, Replacement, SensitiveKeySet,
    DEFAULT_SENSITIVE_KEYS,
};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Mask used when none (or an empty one) is configured.
pub const DEFAULT_MASK: &str = "***";

/// Key/value separators, in the order they are reported.
pub const DEFAULT_KV_SEPARATORS: &[&str] = &["=", ":", "=>", "->"];

/// A user-defined pattern, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPatternSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: PatternCategory,

    /// Regex source.
    pub regex: String,

    /// Replacement template (`$1`, `${name}`). Absent means the whole match
    /// becomes the mask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// User-facing scrubber options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrubberOptions {
    /// Replaces the built-in key list when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_keys: Option<Vec<String>>,

    /// Appended to the effective key list.
    pub extra_sensitive_keys: Vec<String>,

    /// Built-in pattern name → enabled.
    pub pattern_toggles: BTreeMap<String, bool>,

    /// Appended after the built-in patterns.
    pub custom_patterns: Vec<CustomPatternSpec>,

    pub default_mask: String,
    pub kv_separators: Vec<String>,
    pub enable_masking: bool,
    pub mask_url_params: bool,
}

impl Default for ScrubberOptions {
    fn default() -> Self {
        Self {
            sensitive_keys: None,
            extra_sensitive_keys: Vec::new(),
            pattern_toggles: BTreeMap::new(),
            custom_patterns: Vec::new(),
            default_mask: DEFAULT_MASK.to_string(),
            kv_separators: DEFAULT_KV_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            enable_masking: true,
            mask_url_params: true,
        }
    }
}

impl ScrubberOptions {
    /// Strict parse from a JSON string.
    pub fn parse_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Tolerant read from an arbitrary JSON value.
    ///
    /// Each field is read on its own; a field with the wrong type keeps its
    /// default and yields a diagnostic. Unknown fields are ignored.
    pub fn from_value(value: &Value) -> (Self, Vec<ConfigDiagnostic>) {
        let mut options = Self::default();
        let mut diagnostics = Vec::new();

        let Some(map) = value.as_object() else {
            if !value.is_null() {
                diagnostics.push(ConfigDiagnostic::new(
                    "scrubberOptions",
                    "expected an object; using defaults",
                ));
            }
            return (options, diagnostics);
        };

        if let Some(v) = map.get("sensitiveKeys") {
            if !v.is_null() {
                options.sensitive_keys = string_list(v, "sensitiveKeys", &mut diagnostics);
            }
        }
        if let Some(v) = map.get("extraSensitiveKeys") {
            if let Some(keys) = string_list(v, "extraSensitiveKeys", &mut diagnostics) {
                options.extra_sensitive_keys = keys;
            }
        }
        if let Some(v) = map.get("patternToggles") {
            match v.as_object() {
                Some(toggles) => {
                    for (name, enabled) in toggles {
                        match enabled.as_bool() {
                            Some(enabled) => {
                                options.pattern_toggles.insert(name.clone(), enabled);
                            }
                            None => diagnostics.push(ConfigDiagnostic::new(
                                format!("patternToggles.{name}"),
                                "expected a boolean",
                            )),
                        }
                    }
                }
                None => diagnostics.push(ConfigDiagnostic::new(
                    "patternToggles",
                    "expected an object of name → boolean",
                )),
            }
        }
        if let Some(v) = map.get("customPatterns") {
            match v.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        match serde_json::from_value::<CustomPatternSpec>(item.clone()) {
                            Ok(spec) => options.custom_patterns.push(spec),
                            Err(err) => diagnostics.push(ConfigDiagnostic::new(
                                format!("customPatterns[{i}]"),
                                err.to_string(),
                            )),
                        }
                    }
                }
                None => diagnostics.push(ConfigDiagnostic::new(
                    "customPatterns",
                    "expected an array",
                )),
            }
        }
        if let Some(v) = map.get("defaultMask") {
            match v.as_str() {
                Some(mask) => options.default_mask = mask.to_string(),
                None => diagnostics.push(ConfigDiagnostic::new("defaultMask", "expected a string")),
            }
        }
        if let Some(v) = map.get("kvSeparators") {
            if let Some(seps) = string_list(v, "kvSeparators", &mut diagnostics) {
                options.kv_separators = seps;
            }
        }
        if let Some(v) = map.get("enableMasking") {
            bool_field(v, "enableMasking", &mut options.enable_masking, &mut diagnostics);
        }
        if let Some(v) = map.get("maskUrlParams") {
            bool_field(v, "maskUrlParams", &mut options.mask_url_params, &mut diagnostics);
        }

        (options, diagnostics)
    }
}

fn string_list(
    value: &Value,
    field: &str,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        diagnostics.push(ConfigDiagnostic::new(field, "expected an array of strings"));
        return None;
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => out.push(s.to_string()),
            None => diagnostics.push(ConfigDiagnostic::new(
                format!("{field}[{i}]"),
                "expected a string",
            )),
        }
    }
    Some(out)
}

fn bool_field(value: &Value, field: &str, slot: &mut bool, diagnostics: &mut Vec<ConfigDiagnostic>) {
    match value.as_bool() {
        Some(b) => *slot = b,
        None => diagnostics.push(ConfigDiagnostic::new(field, "expected a boolean")),
    }
}

/// A configuration problem that was tolerated by dropping the field or rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDiagnostic {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ConfigDiagnostic {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl PatternCatalog {
    /// Build the effective catalog for a set of options, disabled rules
    /// included. `mask` is the already-normalized default mask.
    pub fn from_options(
        options: &ScrubberOptions,
        mask: &str,
        diagnostics: &mut Vec<ConfigDiagnostic>,
    ) -> Self {
        let mut keys = match &options.sensitive_keys {
            Some(keys) => SensitiveKeySet::new(keys),
            None => SensitiveKeySet::new(DEFAULT_SENSITIVE_KEYS.iter().copied()),
        };
        for key in &options.extra_sensitive_keys {
            keys.insert(key);
        }

        let mut catalog = PatternCatalog::new(keys, builtin_patterns(diagnostics));

        for (name, enabled) in &options.pattern_toggles {
            if !catalog.set_enabled(name, *enabled) {
                diagnostics.push(ConfigDiagnostic::new(
                    format!("patternToggles.{name}"),
                    "unknown pattern; toggle ignored",
                ));
            }
        }

        for (i, spec) in options.custom_patterns.iter().enumerate() {
            let field = format!("customPatterns[{i}]");
            if spec.name.trim().is_empty() {
                diagnostics.push(ConfigDiagnostic::new(field, "pattern name is empty"));
                continue;
            }
            let replacement = match &spec.replacement {
                Some(template) => Replacement::literal(template.clone()),
                None => Replacement::literal(mask.replace('$', "$$")),
            };
            let pattern = match Pattern::new(
                spec.name.clone(),
                spec.description.clone(),
                spec.category,
                &spec.regex,
                replacement,
            ) {
                Ok(p) => p.with_enabled(spec.enabled),
                Err(err) => {
                    diagnostics.push(ConfigDiagnostic::new(field, err.to_string()));
                    continue;
                }
            };
            if let Err(err) = catalog.push(pattern) {
                diagnostics.push(ConfigDiagnostic::new(field, err.to_string()));
            }
        }

        catalog
    }
}

/// Result of [`ScrubberConfig::build`].
#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    pub config: ScrubberConfig,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

/// Normalized scrubber configuration. Read-only once built.
#[derive(Debug, Clone)]
pub struct ScrubberConfig {
    sensitive_keys: SensitiveKeySet,
    patterns: Vec<Pattern>,
    kv_separators: Vec<String>,
    default_mask: String,
    enable_masking: bool,
    mask_url_params: bool,
    matchers: KeyMatchers,
}

impl Default for ScrubberConfig {
    fn default() -> Self {
        Self::build(&ScrubberOptions::default()).config
    }
}

impl ScrubberConfig {
    /// Normalize options into a config, collecting diagnostics.
    pub fn build(options: &ScrubberOptions) -> NormalizedConfig {
        let mut diagnostics = Vec::new();

        let default_mask = if options.default_mask.is_empty() {
            diagnostics.push(ConfigDiagnostic::new(
                "defaultMask",
                format!("empty mask; using '{DEFAULT_MASK}'"),
            ));
            DEFAULT_MASK.to_string()
        } else {
            options.default_mask.clone()
        };

        let mut seen = HashSet::new();
        let mut kv_separators = Vec::new();
        for (i, sep) in options.kv_separators.iter().enumerate() {
            if sep.is_empty() {
                diagnostics.push(ConfigDiagnostic::new(
                    format!("kvSeparators[{i}]"),
                    "empty separator dropped",
                ));
            } else if seen.insert(sep.as_str()) {
                kv_separators.push(sep.clone());
            }
        }
        if kv_separators.is_empty() {
            diagnostics.push(ConfigDiagnostic::new(
                "kvSeparators",
                "no usable separators; using defaults",
            ));
            kv_separators = DEFAULT_KV_SEPARATORS.iter().map(|s| s.to_string()).collect();
        }

        let catalog = PatternCatalog::from_options(options, &default_mask, &mut diagnostics);
        let (sensitive_keys, patterns) = catalog.into_parts();
        let patterns: Vec<Pattern> = patterns.into_iter().filter(|p| p.enabled).collect();

        let matchers = KeyMatchers::compile(&sensitive_keys, &kv_separators, &mut diagnostics);

        NormalizedConfig {
            config: Self {
                sensitive_keys,
                patterns,
                kv_separators,
                default_mask,
                enable_masking: options.enable_masking,
                mask_url_params: options.mask_url_params,
                matchers,
            },
            diagnostics,
        }
    }

    /// Normalize options, reporting each diagnostic through `tracing`.
    pub fn from_options(options: &ScrubberOptions) -> Self {
        let normalized = Self::build(options);
        for diagnostic in &normalized.diagnostics {
            tracing::warn!(field = %diagnostic.field, "scrubber config: {}", diagnostic.message);
        }
        normalized.config
    }

    /// Append a compiled rule after the configured ones. Disabled rules are
    /// ignored.
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        if pattern.enabled {
            self.patterns.push(pattern);
        }
        self
    }

    pub fn sensitive_keys(&self) -> &SensitiveKeySet {
        &self.sensitive_keys
    }

    /// Enabled patterns, in catalog order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn kv_separators(&self) -> &[String] {
        &self.kv_separators
    }

    pub fn default_mask(&self) -> &str {
        &self.default_mask
    }

    pub fn enable_masking(&self) -> bool {
        self.enable_masking
    }

    pub fn mask_url_params(&self) -> bool {
        self.mask_url_params
    }

    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.sensitive_keys.contains(key)
    }

    /// KV pass: `token <sep> value` where the token is a sensitive key.
    pub(crate) fn mask_kv_pairs(&self, text: &str) -> Option<(String, usize)> {
        let re = self.matchers.kv.as_ref()?;
        self.mask_values(re, text, |caps| self.is_sensitive_key(&caps["key"]))
    }

    /// Keyword pass: a sensitive key followed by a separator, anywhere.
    pub(crate) fn mask_keywords(&self, text: &str) -> Option<(String, usize)> {
        let re = self.matchers.keyword.as_ref()?;
        self.mask_values(re, text, |_| true)
    }

    /// `key[:=]value` inside a JSON string leaf.
    pub(crate) fn mask_embedded(&self, text: &str) -> Option<(String, usize)> {
        let re = self.matchers.embedded.as_ref()?;
        self.mask_values(re, text, |_| true)
    }

    fn mask_values<F>(&self, re: &Regex, text: &str, is_sensitive: F) -> Option<(String, usize)>
    where
        F: Fn(&Captures<'_>) -> bool,
    {
        let mut hits = 0usize;
        let rewritten = re.replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let (Some(m), Some(value)) = (caps.get(0), caps.name("value")) else {
                return whole.to_string();
            };
            if !is_sensitive(caps) || self.starts_with_mask(&text[value.start()..]) {
                return whole.to_string();
            }
            let prefix = &text[m.start()..value.start()];
            match self.mask_value(value.as_str()) {
                Some(masked) => {
                    hits += 1;
                    format!("{prefix}{masked}")
                }
                None => whole.to_string(),
            }
        });
        (hits > 0).then(|| (rewritten.into_owned(), hits))
    }

    /// Whether `rest` opens with the mask, bare or quoted. A mask containing
    /// whitespace or `,;&` is wider than one captured value.
    fn starts_with_mask(&self, rest: &str) -> bool {
        let mask = self.default_mask.as_str();
        rest.starts_with(mask)
            || ['"', '\''].into_iter().any(|quote| {
                rest.strip_prefix(quote)
                    .and_then(|r| r.strip_prefix(mask))
                    .is_some_and(|r| r.starts_with(quote))
            })
    }

    /// Mask a captured value, keeping surrounding quotes. `None` when the value
    /// already is the mask.
    fn mask_value(&self, value: &str) -> Option<String> {
        let mask = self.default_mask.as_str();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                let inner = &value[1..value.len() - 1];
                return (inner != mask).then(|| format!("{quote}{mask}{quote}"));
            }
        }
        (value != mask).then(|| mask.to_string())
    }
}

/// Compiled key/value matchers derived from the key set and separators.
#[derive(Debug, Clone, Default)]
struct KeyMatchers {
    kv: Option<Regex>,
    keyword: Option<Regex>,
    embedded: Option<Regex>,
}

const VALUE_PATTERN: &str = r#""[^"]*"|'[^']*'|(?i:(?:bearer|basic|digest)\s+)?[^\s,;&]+"#;

impl KeyMatchers {
    fn compile(
        keys: &SensitiveKeySet,
        separators: &[String],
        diagnostics: &mut Vec<ConfigDiagnostic>,
    ) -> Self {
        let mut seps: Vec<&str> = separators.iter().map(String::as_str).collect();
        seps.sort_by(|a, b| b.len().cmp(&a.len()));
        let seps = seps
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        let mut compile = |name: &str, source: String| match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(err) => {
                diagnostics.push(ConfigDiagnostic::new(
                    name,
                    format!("matcher failed to compile: {err}"),
                ));
                None
            }
        };

        let kv = compile(
            "kvSeparators",
            format!(
                r#"\b(?P<key>[A-Za-z_][A-Za-z0-9_.\-]*)["']?\s*(?:{seps})\s*(?P<value>{VALUE_PATTERN})"#
            ),
        );

        if keys.is_empty() {
            return Self {
                kv,
                keyword: None,
                embedded: None,
            };
        }

        let key_alt = keys
            .longest_first()
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let keyword = compile(
            "sensitiveKeys",
            format!(r#"(?i)(?P<key>{key_alt})["']?\s*(?:{seps})\s*(?P<value>{VALUE_PATTERN})"#),
        );
        let embedded = compile(
            "sensitiveKeys",
            format!(r#"(?i)(?P<key>{key_alt})\s*[:=]\s*(?P<value>[^\s,;&"']+)"#),
        );

        Self {
            kv,
            keyword,
            embedded,
        }
    }
}
