//! Pattern catalog: sensitive key names and shape-based detection rules.
//!
//! The catalog is configuration. It is compiled once, then shared read-only
//! by every scrubber built from it.

use crate::config::ConfigDiagnostic;
use crate::{Result, ScrubError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Name of the query-string rule. Gated by `mask_url_params`.
pub const URL_WITH_PARAMS: &str = "url_with_params";

/// Statistics key used for key-name driven masking (JSON keys, KV pairs).
pub const SENSITIVE_KEY_RULE: &str = "sensitive_key";

/// Key names whose values are always masked.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "access_token",
    "refresh_token",
    "api_key",
    "apikey",
    "api-key",
    "auth",
    "authorization",
    "credential",
    "credentials",
    "private_key",
    "secret_key",
    "session",
    "sessionid",
    "cookie",
    "client_secret",
];

/// Case-insensitive set of sensitive key names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveKeySet {
    keys: BTreeSet<String>,
}

impl SensitiveKeySet {
    /// Build a key set. Keys are trimmed and lower-cased; blanks are skipped.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for key in keys {
            set.insert(key.as_ref());
        }
        set
    }

    /// The built-in key list.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYS.iter().copied())
    }

    /// Insert a key. Returns false for blank or duplicate keys.
    pub fn insert(&mut self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        self.keys.insert(key.to_lowercase())
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, key: &str) -> bool {
        let key = key.trim();
        if key.bytes().any(|b| b.is_ascii_uppercase()) || !key.is_ascii() {
            self.keys.contains(&key.to_lowercase())
        } else {
            self.keys.contains(key)
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Keys ordered longest first, so regex alternations prefer
    /// `access_token` over `token`.
    pub(crate) fn longest_first(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.iter().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keys
    }
}

/// Transform callback: receives one match's captures and the configured mask.
pub type TransformFn = dyn Fn(&Captures<'_>, &str) -> String + Send + Sync;

/// How a pattern rewrites its matches.
#[derive(Clone)]
pub enum Replacement {
    /// Template with `$1` / `${name}` back-references.
    Literal(String),
    /// Computed replacement.
    Transform(Arc<TransformFn>),
}

impl Replacement {
    pub fn literal(template: impl Into<String>) -> Self {
        Replacement::Literal(template.into())
    }

    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>, &str) -> String + Send + Sync + 'static,
    {
        Replacement::Transform(Arc::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Replacement::Literal(_) => "literal",
            Replacement::Transform(_) => "transform",
        }
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Literal(template) => f.debug_tuple("Literal").field(template).finish(),
            Replacement::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// Broad grouping of rules, for listing and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Credential,
    Token,
    Pii,
    Network,
    Url,
    #[default]
    Custom,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Credential => "credential",
            PatternCategory::Token => "token",
            PatternCategory::Pii => "pii",
            PatternCategory::Network => "network",
            PatternCategory::Url => "url",
            PatternCategory::Custom => "custom",
        }
    }

    /// Parse from string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "credential" => Some(PatternCategory::Credential),
            "token" => Some(PatternCategory::Token),
            "pii" => Some(PatternCategory::Pii),
            "network" => Some(PatternCategory::Network),
            "url" => Some(PatternCategory::Url),
            "custom" => Some(PatternCategory::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled shape-based masking rule.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub description: String,
    pub category: PatternCategory,
    pub regex: Regex,
    pub replacement: Replacement,
    pub enabled: bool,
}

impl Pattern {
    /// Compile a new, enabled pattern.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: PatternCategory,
        pattern: &str,
        replacement: Replacement,
    ) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| ScrubError::pattern(name.clone(), e))?;
        Ok(Self {
            name,
            description: description.into(),
            category,
            regex,
            replacement,
            enabled: true,
        })
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Apply the rule to `text`.
    ///
    /// Returns `None` when the regex does not match at all, otherwise the
    /// rewritten text and the number of matches. The rewritten text may equal
    /// the input (already-masked content).
    pub fn apply(&self, text: &str, mask: &str) -> Option<(String, usize)> {
        let hits = self.regex.find_iter(text).count();
        if hits == 0 {
            return None;
        }

        let rewritten = match &self.replacement {
            Replacement::Literal(template) => self.regex.replace_all(text, template.as_str()),
            Replacement::Transform(transform) => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| transform(caps, mask)),
        };

        Some((rewritten.into_owned(), hits))
    }
}

/// Listing row for a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInfo {
    pub name: String,
    pub description: String,
    pub category: PatternCategory,
    pub replacement: String,
    pub enabled: bool,
}

/// Ordered set of sensitive keys and patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    keys: SensitiveKeySet,
    patterns: Vec<Pattern>,
}

impl PatternCatalog {
    pub fn new(keys: SensitiveKeySet, patterns: Vec<Pattern>) -> Self {
        Self { keys, patterns }
    }

    /// The built-in catalog with every rule enabled.
    pub fn builtin() -> Self {
        let mut diagnostics = Vec::new();
        let patterns = builtin_patterns(&mut diagnostics);
        for diagnostic in &diagnostics {
            tracing::warn!(field = %diagnostic.field, "dropping builtin rule: {}", diagnostic.message);
        }
        Self::new(SensitiveKeySet::builtin(), patterns)
    }

    pub fn keys(&self) -> &SensitiveKeySet {
        &self.keys
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Enabled patterns in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(|p| p.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Enable or disable a rule by name. Returns false if unknown.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.patterns.iter_mut().find(|p| p.name == name) {
            Some(pattern) => {
                pattern.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Append a rule. Names must be unique.
    pub fn push(&mut self, pattern: Pattern) -> Result<()> {
        if self.get(&pattern.name).is_some() {
            return Err(ScrubError::ConfigError(format!(
                "duplicate pattern name '{}'",
                pattern.name
            )));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    pub fn describe(&self) -> Vec<PatternInfo> {
        self.patterns
            .iter()
            .map(|p| PatternInfo {
                name: p.name.clone(),
                description: p.description.clone(),
                category: p.category,
                replacement: p.replacement.kind().to_string(),
                enabled: p.enabled,
            })
            .collect()
    }

    pub(crate) fn into_parts(self) -> (SensitiveKeySet, Vec<Pattern>) {
        (self.keys, self.patterns)
    }
}

type BuiltinTransform = fn(&Captures<'_>, &str) -> String;

enum BuiltinReplacement {
    Literal(&'static str),
    Transform(BuiltinTransform),
}

struct BuiltinPattern {
    name: &'static str,
    description: &'static str,
    category: PatternCategory,
    pattern: &'static str,
    replacement: BuiltinReplacement,
}

// Order matters: longer numeric shapes (ID card, bank card) run before the
// 11-digit phone rule, and key material before generic token shapes.
static BUILTIN_PATTERNS: &[BuiltinPattern] = &[
    BuiltinPattern {
        name: "private_key",
        description: "PEM private key block",
        category: PatternCategory::Credential,
        pattern: r"-----BEGIN ([A-Z ]*)PRIVATE KEY-----\s*[A-Za-z0-9+/=]{16,}[A-Za-z0-9+/=\s]*(?:-----END [A-Z ]*PRIVATE KEY-----)?",
        replacement: BuiltinReplacement::Transform(mask_private_key),
    },
    BuiltinPattern {
        name: "jwt",
        description: "JSON Web Token",
        category: PatternCategory::Token,
        pattern: r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
        replacement: BuiltinReplacement::Transform(mask_jwt),
    },
    BuiltinPattern {
        name: "bearer_token",
        description: "HTTP bearer credential",
        category: PatternCategory::Token,
        pattern: r"(?i)\b(bearer\s+)[A-Za-z0-9\-._~+/]+=*",
        replacement: BuiltinReplacement::Transform(mask_keep_first_group),
    },
    BuiltinPattern {
        name: "aws_access_key",
        description: "AWS access key ID",
        category: PatternCategory::Credential,
        pattern: r"\bAKIA[0-9A-Z]{16}\b",
        replacement: BuiltinReplacement::Transform(mask_aws_key),
    },
    BuiltinPattern {
        name: "github_token",
        description: "GitHub personal access token",
        category: PatternCategory::Token,
        pattern: r"\b(gh[pousr]_)[A-Za-z0-9_]{36,}",
        replacement: BuiltinReplacement::Transform(mask_keep_first_group),
    },
    BuiltinPattern {
        name: URL_WITH_PARAMS,
        description: "URL query-string parameter values",
        category: PatternCategory::Url,
        pattern: r#"\bhttps?://[^\s?#"'<>]+\?[^\s#"'<>]+"#,
        replacement: BuiltinReplacement::Transform(mask_url_query),
    },
    BuiltinPattern {
        name: "email",
        description: "Email address",
        category: PatternCategory::Pii,
        pattern: r"\b([A-Za-z0-9._%+-])[A-Za-z0-9._%+-]*@([A-Za-z0-9.-]+\.[A-Za-z]{2,})\b",
        replacement: BuiltinReplacement::Transform(mask_email),
    },
    BuiltinPattern {
        name: "id_card_cn",
        description: "Mainland China resident ID number",
        category: PatternCategory::Pii,
        pattern: r"\b([0-9]{6})(?:18|19|20)[0-9]{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12][0-9]|3[01])([0-9]{3}[0-9Xx])\b",
        replacement: BuiltinReplacement::Literal("${1}********${2}"),
    },
    BuiltinPattern {
        name: "bank_card",
        description: "Bank card number (16-19 digits)",
        category: PatternCategory::Pii,
        pattern: r"\b([0-9]{4})[0-9]{8,11}([0-9]{4})\b",
        replacement: BuiltinReplacement::Literal("${1}********${2}"),
    },
    BuiltinPattern {
        name: "phone_cn",
        description: "Mainland China mobile number",
        category: PatternCategory::Pii,
        pattern: r"\b(1[3-9][0-9])[0-9]{4}([0-9]{4})\b",
        replacement: BuiltinReplacement::Literal("${1}****${2}"),
    },
    BuiltinPattern {
        name: "ipv4",
        description: "IPv4 address (first octet kept)",
        category: PatternCategory::Network,
        pattern: r"\b((?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9]))\.(?:[0-9]{1,3})\.(?:[0-9]{1,3})\.(?:[0-9]{1,3})\b",
        replacement: BuiltinReplacement::Transform(mask_ipv4),
    },
];

/// Names of the built-in rules, in catalog order.
pub fn builtin_pattern_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_PATTERNS.iter().map(|p| p.name)
}

/// Compile the built-in rules. Rules that fail to compile are dropped with a
/// diagnostic rather than aborting the catalog.
pub(crate) fn builtin_patterns(diagnostics: &mut Vec<ConfigDiagnostic>) -> Vec<Pattern> {
    let mut patterns = Vec::with_capacity(BUILTIN_PATTERNS.len());
    for builtin in BUILTIN_PATTERNS {
        let replacement = match builtin.replacement {
            BuiltinReplacement::Literal(template) => Replacement::literal(template),
            BuiltinReplacement::Transform(f) => Replacement::Transform(Arc::new(f)),
        };
        match Pattern::new(
            builtin.name,
            builtin.description,
            builtin.category,
            builtin.pattern,
            replacement,
        ) {
            Ok(pattern) => patterns.push(pattern),
            Err(err) => diagnostics.push(ConfigDiagnostic::new(
                format!("patterns.{}", builtin.name),
                err.to_string(),
            )),
        }
    }
    patterns
}

fn mask_private_key(caps: &Captures<'_>, mask: &str) -> String {
    format!("-----BEGIN {}PRIVATE KEY-----{}", &caps[1], mask)
}

fn mask_jwt(_caps: &Captures<'_>, mask: &str) -> String {
    format!("eyJ{}", mask)
}

fn mask_keep_first_group(caps: &Captures<'_>, mask: &str) -> String {
    format!("{}{}", &caps[1], mask)
}

fn mask_aws_key(_caps: &Captures<'_>, mask: &str) -> String {
    format!("AKIA{}", mask)
}

fn mask_email(caps: &Captures<'_>, mask: &str) -> String {
    format!("{}{}@{}", &caps[1], mask, &caps[2])
}

fn mask_ipv4(caps: &Captures<'_>, mask: &str) -> String {
    format!("{first}.{m}.{m}.{m}", first = &caps[1], m = mask)
}

static QUERY_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^&=;]+)=([^&;]*)").unwrap());

fn mask_url_query(caps: &Captures<'_>, mask: &str) -> String {
    let url = &caps[0];
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let masked = QUERY_PAIR.replace_all(query, |pair: &Captures<'_>| {
        if pair[2].is_empty() {
            pair[0].to_string()
        } else {
            format!("{}={}", &pair[1], mask)
        }
    });
    format!("{}?{}", base, masked)
}
