//! Key normalization shared by every flat-key source
//!
//! Environment variables, dotenv entries, secret payload keys, secret
//! file names, override and settings file keys, and nested key segments
//! all go through [`KeyNormalizer`], so prefix stripping and case folding
//! behave the same everywhere.

use std::collections::BTreeMap;

/// Strips an optional prefix and folds case
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNormalizer {
    prefix: Option<String>,
    case_sensitive: bool,
}

impl KeyNormalizer {
    /// Case-insensitive normalizer without a prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix that every key must carry (e.g. `IMAD_`)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Keep keys as-is instead of lowercasing them
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Normalize a raw key.
    ///
    /// Returns `None` when the key does not carry the configured prefix or
    /// nothing remains after stripping it.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let stripped = match &self.prefix {
            Some(prefix) => strip_prefix(raw, prefix, self.case_sensitive)?,
            None => raw,
        };
        if stripped.is_empty() {
            return None;
        }
        Some(self.fold(stripped))
    }

    /// Fold a key for comparison (no prefix handling)
    pub fn fold(&self, key: &str) -> String {
        if self.case_sensitive {
            key.to_string()
        } else {
            key.to_lowercase()
        }
    }

    /// Whether `candidate` names `declared` under this normalizer's case rules
    pub fn matches(&self, candidate: &str, declared: &str) -> bool {
        if self.case_sensitive {
            candidate == declared
        } else {
            candidate == declared || candidate.to_lowercase() == declared.to_lowercase()
        }
    }

    /// Entry of `map` naming `declared`: the exact key first, then any
    /// key that matches under the case rules
    pub fn find_in<'m, V>(
        &self,
        map: &'m BTreeMap<String, V>,
        declared: &str,
    ) -> Option<(&'m String, &'m V)> {
        map.get_key_value(declared).or_else(|| {
            if self.case_sensitive {
                return None;
            }
            map.iter().find(|(key, _)| self.matches(key, declared))
        })
    }
}

fn strip_prefix<'a>(raw: &'a str, prefix: &str, case_sensitive: bool) -> Option<&'a str> {
    if case_sensitive {
        return raw.strip_prefix(prefix);
    }
    if raw.len() < prefix.len() || !raw.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = raw.split_at(prefix.len());
    if head.to_lowercase() == prefix.to_lowercase() {
        Some(tail)
    } else {
        None
    }
}
