//! Raw (untyped) values produced by sources

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// Nested mapping of raw values, ordered for deterministic output
pub type RawMap = BTreeMap<String, RawValue>;

/// An untyped value returned by a source before coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<RawValue>),
    Map(RawMap),
}

impl RawValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&RawMap> {
        match self {
            RawValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, RawValue::Map(_))
    }

    /// Short name of the variant, used in validation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Str(_) => "string",
            RawValue::Bytes(_) => "bytes",
            RawValue::List(_) => "list",
            RawValue::Map(_) => "mapping",
        }
    }

    /// Convert a JSON value.
    ///
    /// Scalars become strings (coercion happens during validation); `null`
    /// means absent and yields `None`, also inside lists and objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(RawValue::Str(b.to_string())),
            Value::Number(n) => Some(RawValue::Str(n.to_string())),
            Value::String(s) => Some(RawValue::Str(s)),
            Value::Array(items) => Some(RawValue::List(
                items.into_iter().filter_map(RawValue::from_json).collect(),
            )),
            Value::Object(entries) => Some(RawValue::Map(
                entries
                    .into_iter()
                    .filter_map(|(k, v)| RawValue::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    /// Dotted paths of every leaf below this value
    pub fn leaf_paths(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        collect_leaves(self, prefix, &mut out);
        out
    }
}

fn collect_leaves(value: &RawValue, path: &str, out: &mut Vec<String>) {
    match value {
        RawValue::Map(entries) if !entries.is_empty() => {
            for (key, child) in entries {
                collect_leaves(child, &join_path(path, key), out);
            }
        }
        _ => out.push(path.to_string()),
    }
}

/// Join a dotted path with one more segment
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", parent, segment)
    }
}

/// Merge `top` into `base`, `top` winning on every leaf it defines.
///
/// Two mappings merge key by key; any other combination replaces `base`.
pub fn deep_merge(base: &mut RawValue, top: RawValue) {
    match (base, top) {
        (RawValue::Map(base_map), RawValue::Map(top_map)) => deep_merge_maps(base_map, top_map),
        (base, top) => *base = top,
    }
}

/// Map flavour of [`deep_merge`]
pub fn deep_merge_maps(base: &mut RawMap, top: RawMap) {
    for (key, value) in top {
        match base.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(s)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(bytes: Vec<u8>) -> Self {
        RawValue::Bytes(bytes)
    }
}

impl From<RawMap> for RawValue {
    fn from(map: RawMap) -> Self {
        RawValue::Map(map)
    }
}

/// Bytes serialize as text when they are valid UTF-8, otherwise as an array
impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Str(s) => serializer.serialize_str(s),
            RawValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(text) => serializer.serialize_str(text),
                Err(_) => b.serialize(serializer),
            },
            RawValue::List(items) => items.serialize(serializer),
            RawValue::Map(entries) => entries.serialize(serializer),
        }
    }
}

/// What a source returned for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    /// The raw value found
    pub value: RawValue,
    /// The key actually used to find it (for diagnostics)
    pub key: String,
    /// The value is a string that still needs structural (JSON) decoding
    pub complex: bool,
}

impl FieldLookup {
    pub fn new(value: impl Into<RawValue>, key: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            key: key.into(),
            complex: false,
        }
    }

    /// Mark whether the value needs structural decoding
    pub fn complex(mut self, complex: bool) -> Self {
        self.complex = complex;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, RawValue)]) -> RawValue {
        RawValue::Map(entries.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_from_json_scalars_become_strings() {
        let value = RawValue::from_json(json!({"port": 8080, "debug": true, "name": "svc", "gone": null}))
            .unwrap();
        assert_eq!(
            value,
            map(&[
                ("debug", "true".into()),
                ("name", "svc".into()),
                ("port", "8080".into()),
            ])
        );
        assert!(RawValue::from_json(json!(null)).is_none());
    }

    #[test]
    fn test_deep_merge_top_wins_per_leaf() {
        let mut base = map(&[
            ("v1", "base-1".into()),
            ("deep", map(&[("v3", "base-3".into()), ("v4", "base-4".into())])),
        ]);
        let top = map(&[("deep", map(&[("v4", "top-4".into())]))]);
        deep_merge(&mut base, top);

        assert_eq!(
            base,
            map(&[
                ("deep", map(&[("v3", "base-3".into()), ("v4", "top-4".into())])),
                ("v1", "base-1".into()),
            ])
        );
    }

    #[test]
    fn test_deep_merge_scalar_replaces_map() {
        let mut base = map(&[("a", map(&[("b", "1".into())]))]);
        deep_merge(&mut base, map(&[("a", "flat".into())]));
        assert_eq!(base, map(&[("a", "flat".into())]));
    }

    #[test]
    fn test_leaf_paths() {
        let value = map(&[
            ("v0", "0".into()),
            ("sub", map(&[("v1", "1".into()), ("deep", map(&[("v4", "4".into())]))])),
        ]);
        assert_eq!(value.leaf_paths(""), vec!["sub.deep.v4", "sub.v1", "v0"]);
    }

    #[test]
    fn test_serialize() {
        let value = map(&[
            ("cert", RawValue::Bytes(vec![0xff])),
            ("name", RawValue::Bytes(b"svc".to_vec())),
            ("ports", RawValue::List(vec!["80".into()])),
        ]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"cert": [255], "name": "svc", "ports": ["80"]})
        );
    }

    #[test]
    fn test_field_lookup_builder() {
        let lookup = FieldLookup::new("[1, 2]", "PORTS").complex(true);
        assert!(lookup.complex);
        assert_eq!(lookup.key, "PORTS");
        assert_eq!(lookup.value.kind_name(), "string");
    }
}
