//! Coercion of merged raw values into typed settings
//!
//! All problems are collected before failing, so one run reports every
//! missing or invalid field. Messages describe the expected type only and
//! never echo the value.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::SecretString;

use super::resolved::SettingValue;
use crate::schema::{Field, FieldKind, Schema};
use crate::value::{join_path, RawMap, RawValue};

/// What is wrong with one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// Required and not supplied by any source
    Missing,
    /// The raw value has the wrong shape (e.g. a mapping for a string)
    WrongShape { expected: &'static str, found: &'static str },
    /// The raw string could not be parsed as the declared type
    Unparsable { expected: &'static str },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => write!(f, "field required"),
            FieldProblem::WrongShape { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            FieldProblem::Unparsable { expected } => write!(f, "not a valid {}", expected),
        }
    }
}

/// A problem at one dotted field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

/// Every field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Paths of the offending fields, in schema order
    pub fn paths(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} validation {}", self.errors.len(), noun)?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Validate `raw` against `schema`
pub(crate) fn validate(
    schema: &Schema,
    raw: &RawMap,
) -> Result<BTreeMap<String, SettingValue>, ValidationErrors> {
    let mut errors = Vec::new();
    let values = validate_level(schema, raw, "", &mut errors);
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(ValidationErrors { errors })
    }
}

fn validate_level(
    schema: &Schema,
    raw: &RawMap,
    prefix: &str,
    errors: &mut Vec<FieldError>,
) -> BTreeMap<String, SettingValue> {
    let mut out = BTreeMap::new();
    for field in schema.fields() {
        let path = join_path(prefix, &field.name);
        let supplied = raw.get(&field.name).cloned().or_else(|| default_of(field));
        match supplied {
            Some(value) => {
                if let Some(typed) = coerce(&field.kind, &value, &path, errors) {
                    out.insert(field.name.clone(), typed);
                }
            }
            None if field.required => errors.push(FieldError {
                path,
                problem: FieldProblem::Missing,
            }),
            None => {}
        }
    }
    out
}

fn default_of(field: &Field) -> Option<RawValue> {
    field.default.clone().and_then(RawValue::from_json)
}

fn coerce(
    kind: &FieldKind,
    raw: &RawValue,
    path: &str,
    errors: &mut Vec<FieldError>,
) -> Option<SettingValue> {
    let result = match kind {
        FieldKind::String => text(raw).map(|s| SettingValue::String(s.to_string())),
        FieldKind::Secret => text(raw).map(|s| SettingValue::Secret(SecretString::new(s.into()))),
        FieldKind::Bytes => match raw {
            RawValue::Str(s) => Ok(SettingValue::Bytes(s.as_bytes().to_vec())),
            RawValue::Bytes(b) => Ok(SettingValue::Bytes(b.clone())),
            other => Err(wrong_shape("bytes", other)),
        },
        FieldKind::Integer => parse_with(raw, "integer", |s| s.parse::<i64>().ok())
            .map(SettingValue::Integer),
        FieldKind::Float => {
            parse_with(raw, "float", |s| s.parse::<f64>().ok()).map(SettingValue::Float)
        }
        FieldKind::Boolean => parse_with(raw, "boolean", parse_bool).map(SettingValue::Boolean),
        FieldKind::List { items } => match raw {
            RawValue::List(values) => {
                let before = errors.len();
                let typed: Vec<SettingValue> = values
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| coerce(items, item, &format!("{}.{}", path, i), errors))
                    .collect();
                if errors.len() > before {
                    return None;
                }
                Ok(SettingValue::List(typed))
            }
            other => Err(wrong_shape("list", other)),
        },
        FieldKind::Object { fields } => match raw {
            RawValue::Map(map) => {
                let before = errors.len();
                let typed = validate_level(fields, map, path, errors);
                if errors.len() > before {
                    return None;
                }
                Ok(SettingValue::Object(typed))
            }
            other => Err(wrong_shape("object", other)),
        },
    };

    match result {
        Ok(value) => Some(value),
        Err(problem) => {
            errors.push(FieldError {
                path: path.to_string(),
                problem,
            });
            None
        }
    }
}

fn wrong_shape(expected: &'static str, found: &RawValue) -> FieldProblem {
    FieldProblem::WrongShape {
        expected,
        found: found.kind_name(),
    }
}

fn text(raw: &RawValue) -> Result<&str, FieldProblem> {
    match raw {
        RawValue::Str(s) => Ok(s),
        RawValue::Bytes(b) => {
            std::str::from_utf8(b).map_err(|_| FieldProblem::Unparsable { expected: "UTF-8 string" })
        }
        other => Err(wrong_shape("string", other)),
    }
}

fn parse_with<T>(
    raw: &RawValue,
    expected: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, FieldProblem> {
    let s = match raw {
        RawValue::Str(_) | RawValue::Bytes(_) => text(raw)?,
        other => return Err(wrong_shape(expected, other)),
    };
    parse(s.trim()).ok_or(FieldProblem::Unparsable { expected })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
