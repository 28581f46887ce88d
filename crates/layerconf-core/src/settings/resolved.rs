//! The final, typed settings object

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::SettingsResult;
use crate::resolver::Provenance;

/// Placeholder written in place of secret values
pub const REDACTED: &str = "**********";

/// One validated setting
#[derive(Debug, Clone)]
pub enum SettingValue {
    String(String),
    Secret(SecretString),
    Bytes(Vec<u8>),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<SettingValue>),
    Object(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretString> {
        match self {
            SettingValue::Secret(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SettingValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, SettingValue>> {
        match self {
            SettingValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// JSON with secrets exposed and bytes as arrays of numbers
    fn to_exposed_json(&self) -> Value {
        match self {
            SettingValue::String(s) => Value::String(s.clone()),
            SettingValue::Secret(s) => Value::String(s.expose_secret().to_string()),
            SettingValue::Bytes(b) => Value::Array(b.iter().map(|&byte| Value::from(byte)).collect()),
            SettingValue::Integer(i) => Value::from(*i),
            SettingValue::Float(f) => Value::from(*f),
            SettingValue::Boolean(b) => Value::Bool(*b),
            SettingValue::List(items) => Value::Array(items.iter().map(Self::to_exposed_json).collect()),
            SettingValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_exposed_json()))
                    .collect(),
            ),
        }
    }
}

/// Redacted form: secrets become `**********`, UTF-8 bytes become text
impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SettingValue::String(s) => serializer.serialize_str(s),
            SettingValue::Secret(_) => serializer.serialize_str(REDACTED),
            SettingValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(text) => serializer.serialize_str(text),
                Err(_) => {
                    let mut seq = serializer.serialize_seq(Some(b.len()))?;
                    for byte in b {
                        seq.serialize_element(byte)?;
                    }
                    seq.end()
                }
            },
            SettingValue::Integer(i) => serializer.serialize_i64(*i),
            SettingValue::Float(f) => serializer.serialize_f64(*f),
            SettingValue::Boolean(b) => serializer.serialize_bool(*b),
            SettingValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            SettingValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Validated settings, immutable once built
///
/// Serializing yields the redacted nested mapping; use
/// [`deserialize`](Self::deserialize) to get a typed struct with the real
/// secret values.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    values: BTreeMap<String, SettingValue>,
    provenance: BTreeMap<String, Provenance>,
}

impl ResolvedSettings {
    pub(crate) fn new(
        values: BTreeMap<String, SettingValue>,
        provenance: BTreeMap<String, Provenance>,
    ) -> Self {
        Self { values, provenance }
    }

    pub fn values(&self) -> &BTreeMap<String, SettingValue> {
        &self.values
    }

    /// Look up a value by dotted path (`db.host`)
    pub fn get(&self, path: &str) -> Option<&SettingValue> {
        let mut segments = path.split('.');
        let mut node = self.values.get(segments.next()?)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn secret(&self, path: &str) -> Option<&SecretString> {
        self.get(path)?.as_secret()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Leaf path to the source and key that supplied it.
    ///
    /// Values filled in from declared defaults have no entry.
    pub fn provenance(&self) -> &BTreeMap<String, Provenance> {
        &self.provenance
    }

    pub fn source_of(&self, path: &str) -> Option<&Provenance> {
        self.provenance.get(path)
    }

    /// Redacted JSON rendering
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Deserialize into a caller's type, with secrets exposed
    pub fn deserialize<T: DeserializeOwned>(&self) -> SettingsResult<T> {
        let value = Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_exposed_json()))
                .collect(),
        );
        Ok(serde_json::from_value(value)?)
    }
}

impl Serialize for ResolvedSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}
