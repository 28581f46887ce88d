//! Nested key decoding
//!
//! Flat key spaces (environment variables, dotenv files, secret file names)
//! encode nesting with a delimiter: `SUB_MODEL__DEEP__V4=v4` becomes
//! `{sub_model: {deep: {v4: "v4"}}}`. Decoding is purely structural and
//! performs no type coercion; prefix stripping and case folding happen
//! before (see [`crate::keys`]).

use std::collections::BTreeMap;

use thiserror::Error;

use crate::keys::KeyNormalizer;
use crate::schema::{Field, Schema};
use crate::value::{deep_merge, join_path, RawMap, RawValue};

/// Errors raised while decoding nested keys or complex values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Key '{key}' collides with a value already assigned at '{path}'")]
    Collision { key: String, path: String },

    #[error("Key '{key}' contains an empty path segment")]
    EmptySegment { key: String },

    #[error("Value of '{key}' is not valid JSON: {message}")]
    InvalidJson { key: String, message: String },
}

/// Decode a complex string value (JSON object or array).
///
/// JSON `null` decodes to `None`. The error names the key only, never the
/// value, since values may be secrets.
pub fn parse_complex(key: &str, raw: &str) -> Result<Option<RawValue>, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson {
            key: key.to_string(),
            message: format!("line {} column {}", e.line(), e.column()),
        })?;
    Ok(RawValue::from_json(value))
}

/// Rebuilds nested mappings from delimited flat keys
///
/// # Example
///
/// ```
/// use layerconf_core::decode::NestedKeyDecoder;
///
/// let decoder = NestedKeyDecoder::new("__");
/// let nested = decoder.decode([("db__host", "localhost"), ("db__port", "5432")]).unwrap();
/// assert_eq!(nested["db"].as_map().unwrap()["host"].as_str(), Some("localhost"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedKeyDecoder {
    delimiter: String,
}

impl NestedKeyDecoder {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split a flat key into path segments
    pub fn split<'a>(&self, key: &'a str) -> Vec<&'a str> {
        if self.delimiter.is_empty() {
            vec![key]
        } else {
            key.split(self.delimiter.as_str()).collect()
        }
    }

    /// Structural decode: segments are kept exactly as given.
    ///
    /// Entries are applied in iteration order, so when two keys decode to
    /// the same leaf the later one wins. Feed entries lowest priority first.
    pub fn decode<I, K, V>(&self, entries: I) -> Result<RawMap, DecodeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        let mut root = RawMap::new();
        for (key, value) in entries {
            self.insert(&mut root, key.as_ref(), value.into(), None, &KeyNormalizer::new())?;
        }
        Ok(root)
    }

    /// Decode against a schema.
    ///
    /// Each segment is matched against the declared field names at its
    /// level under `keys`' case rules and replaced by the declared name.
    /// Unknown segments are kept as given. String values landing on list or
    /// object fields are JSON-decoded.
    pub fn decode_for<I, K, V>(
        &self,
        schema: &Schema,
        keys: &KeyNormalizer,
        entries: I,
    ) -> Result<RawMap, DecodeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        let mut root = RawMap::new();
        for (key, value) in entries {
            self.insert(&mut root, key.as_ref(), value.into(), Some(schema), keys)?;
        }
        Ok(root)
    }

    fn insert(
        &self,
        root: &mut RawMap,
        key: &str,
        value: RawValue,
        schema: Option<&Schema>,
        keys: &KeyNormalizer,
    ) -> Result<(), DecodeError> {
        let segments = self.split(key);
        if segments.iter().any(|s| s.is_empty()) {
            return Err(DecodeError::EmptySegment { key: key.to_string() });
        }
        let Some((last, parents)) = segments.split_last() else {
            return Err(DecodeError::EmptySegment { key: key.to_string() });
        };

        let mut node: &mut RawMap = root;
        let mut level = schema;
        let mut path = String::new();
        for segment in parents {
            let (name, field) = resolve_segment(level, segment, keys);
            path = join_path(&path, &name);
            let entry = node
                .entry(name)
                .or_insert_with(|| RawValue::Map(RawMap::new()));
            node = match entry {
                RawValue::Map(children) => children,
                _ => {
                    return Err(DecodeError::Collision {
                        key: key.to_string(),
                        path,
                    })
                }
            };
            level = field.and_then(Field::nested);
        }

        let (name, field) = resolve_segment(level, last, keys);
        let value = match (field, value) {
            (Some(field), RawValue::Str(raw)) if field.is_complex() => match parse_complex(key, &raw)? {
                Some(decoded) => decoded,
                None => return Ok(()),
            },
            (_, value) => value,
        };

        match node.get_mut(&name) {
            Some(existing) if existing.is_map() => {
                if value.is_map() {
                    deep_merge(existing, value);
                } else {
                    return Err(DecodeError::Collision {
                        key: key.to_string(),
                        path: join_path(&path, &name),
                    });
                }
            }
            Some(existing) => *existing = value,
            None => {
                node.insert(name, value);
            }
        }
        Ok(())
    }

    /// Reverse of [`decode`](Self::decode): join leaf paths with the delimiter
    pub fn flatten(&self, map: &RawMap) -> BTreeMap<String, RawValue> {
        let mut out = BTreeMap::new();
        self.flatten_into(map, "", &mut out);
        out
    }

    fn flatten_into(&self, map: &RawMap, prefix: &str, out: &mut BTreeMap<String, RawValue>) {
        for (key, value) in map {
            let flat_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, self.delimiter, key)
            };
            match value {
                RawValue::Map(children) => self.flatten_into(children, &flat_key, out),
                other => {
                    out.insert(flat_key, other.clone());
                }
            }
        }
    }
}

impl Default for NestedKeyDecoder {
    fn default() -> Self {
        Self::new("__")
    }
}

fn resolve_segment<'s>(
    level: Option<&'s Schema>,
    segment: &str,
    keys: &KeyNormalizer,
) -> (String, Option<&'s Field>) {
    match level.and_then(|schema| schema.find_matching(segment, keys)) {
        Some(field) => (field.name.clone(), Some(field)),
        None => (segment.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind};

    fn sub_model_schema() -> Schema {
        Schema::new()
            .field(Field::string("v0"))
            .field(Field::object(
                "sub_model",
                Schema::new()
                    .field(Field::string("v1"))
                    .field(Field::bytes("v2"))
                    .field(Field::object("deep", Schema::new().field(Field::string("v4")))),
            ))
            .field(Field::list("ports", FieldKind::Integer).optional())
    }

    fn s(value: &str) -> RawValue {
        RawValue::Str(value.to_string())
    }

    #[test]
    fn test_decode_against_schema() {
        let decoder = NestedKeyDecoder::new("__");
        let decoded = decoder
            .decode_for(
                &sub_model_schema(),
                &KeyNormalizer::new(),
                [("V0", "0"), ("SUB_MODEL__V1", "json-1"), ("SUB_MODEL__DEEP__V4", "v4")],
            )
            .unwrap();

        assert_eq!(decoded["v0"], s("0"));
        let sub = decoded["sub_model"].as_map().unwrap();
        assert_eq!(sub["v1"], s("json-1"));
        assert_eq!(sub["deep"].as_map().unwrap()["v4"], s("v4"));
    }

    #[test]
    fn test_case_sensitive_segments_match_exactly() {
        let decoder = NestedKeyDecoder::new("__");
        let keys = KeyNormalizer::new().case_sensitive(true);
        let decoded = decoder
            .decode_for(
                &sub_model_schema(),
                &keys,
                [("SUB_MODEL__V1", "upper"), ("sub_model__DEEP__v4", "v4"), ("PORTS", "[80]")],
            )
            .unwrap();

        assert_eq!(decoded["SUB_MODEL"].as_map().unwrap()["V1"], s("upper"));
        let sub = decoded["sub_model"].as_map().unwrap();
        assert!(sub.get("deep").is_none());
        assert_eq!(sub["DEEP"].as_map().unwrap()["v4"], s("v4"));
        // undeclared at this case, so left as a plain string
        assert_eq!(decoded["PORTS"], s("[80]"));
    }

    #[test]
    fn test_structural_decode_keeps_segments() {
        let decoder = NestedKeyDecoder::new("__");
        let decoded = decoder.decode([("A__B__C", "1")]).unwrap();
        let b = decoded["A"].as_map().unwrap()["B"].as_map().unwrap();
        assert_eq!(b["C"], s("1"));
    }

    #[test]
    fn test_later_entry_wins_on_same_leaf() {
        let decoder = NestedKeyDecoder::new("__");
        let decoded = decoder
            .decode_for(
                &sub_model_schema(),
                &KeyNormalizer::new(),
                [("sub_model__v1", "first"), ("SUB_MODEL__V1", "second")],
            )
            .unwrap();
        assert_eq!(decoded["sub_model"].as_map().unwrap()["v1"], s("second"));
    }

    #[test]
    fn test_segment_through_scalar_collides() {
        let decoder = NestedKeyDecoder::new("__");
        let err = decoder.decode([("a", "1"), ("a__b", "2")]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Collision {
                key: "a__b".to_string(),
                path: "a".to_string()
            }
        );
    }

    #[test]
    fn test_scalar_onto_subtree_collides() {
        let decoder = NestedKeyDecoder::new("__");
        let err = decoder.decode([("a__b", "2"), ("a", "1")]).unwrap_err();
        assert!(matches!(err, DecodeError::Collision { ref path, .. } if path == "a"));
    }

    #[test]
    fn test_complex_terminal_is_json_decoded() {
        let decoder = NestedKeyDecoder::new("__");
        let decoded = decoder
            .decode_for(&sub_model_schema(), &KeyNormalizer::new(), [("PORTS", "[80, 443]")])
            .unwrap();
        assert_eq!(decoded["ports"], RawValue::List(vec![s("80"), s("443")]));
    }

    #[test]
    fn test_json_subtree_merges_with_nested_keys() {
        let decoder = NestedKeyDecoder::new("__");
        let decoded = decoder
            .decode_for(
                &sub_model_schema(),
                &KeyNormalizer::new(),
                [("SUB_MODEL__DEEP__V4", "nested"), ("SUB_MODEL", r#"{"v1": "json-1"}"#)],
            )
            .unwrap();
        let sub = decoded["sub_model"].as_map().unwrap();
        assert_eq!(sub["v1"], s("json-1"));
        assert_eq!(sub["deep"].as_map().unwrap()["v4"], s("nested"));
    }

    #[test]
    fn test_invalid_json_reports_key_only() {
        let decoder = NestedKeyDecoder::new("__");
        let err = decoder
            .decode_for(&sub_model_schema(), &KeyNormalizer::new(), [("PORTS", "not-json-secret")])
            .unwrap_err();
        match err {
            DecodeError::InvalidJson { key, message } => {
                assert_eq!(key, "PORTS");
                assert!(!message.contains("not-json-secret"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_segment() {
        let decoder = NestedKeyDecoder::new("__");
        assert!(matches!(
            decoder.decode([("a____b", "1")]),
            Err(DecodeError::EmptySegment { .. })
        ));
        assert!(matches!(decoder.decode([("__a", "1")]), Err(DecodeError::EmptySegment { .. })));
    }

    #[test]
    fn test_empty_delimiter_disables_nesting() {
        let decoder = NestedKeyDecoder::new("");
        let decoded = decoder.decode([("a__b", "1")]).unwrap();
        assert_eq!(decoded["a__b"], s("1"));
    }

    #[test]
    fn test_flatten_reverses_decode() {
        let decoder = NestedKeyDecoder::new("__");
        let flat = vec![("x__y", "1"), ("x__z__w", "2"), ("top", "3")];
        let decoded = decoder.decode(flat.clone()).unwrap();
        let back = decoder.flatten(&decoded);
        let expected: BTreeMap<String, RawValue> =
            flat.into_iter().map(|(k, v)| (k.to_string(), s(v))).collect();
        assert_eq!(back, expected);
    }
}
