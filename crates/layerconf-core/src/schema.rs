//! Declared settings fields
//!
//! A [`Schema`] is a list of [`Field`]s; object fields carry their own
//! nested schema, so fields form a tree. Schemas can be built in code or
//! loaded from YAML/JSON:
//!
//! ```yaml
//! fields:
//!   - name: v0
//!     type: string
//!   - name: sub_model
//!     type: object
//!     fields:
//!       - name: v1
//!         type: string
//!       - name: v2
//!         type: bytes
//!   - name: ports
//!     type: list
//!     items:
//!       type: integer
//!     required: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeyNormalizer;

/// Errors in a schema declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate field '{name}' at '{level}'")]
    DuplicateField { name: String, level: String },

    #[error("Empty field name at '{level}'")]
    EmptyName { level: String },

    #[error("List '{path}' declares object items without fields")]
    EmptyListItems { path: String },

    #[error("Failed to parse schema: {0}")]
    Parse(String),
}

/// Target type of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    /// A string that is redacted in diagnostics
    Secret,
    Bytes,
    Integer,
    Float,
    Boolean,
    List { items: Box<FieldKind> },
    Object { fields: Schema },
}

impl FieldKind {
    /// Whether a string value for this kind needs structural (JSON) decoding
    pub fn is_complex(&self) -> bool {
        matches!(self, FieldKind::List { .. } | FieldKind::Object { .. })
    }

    /// Nested schema of an object field
    pub fn nested(&self) -> Option<&Schema> {
        match self {
            FieldKind::Object { fields } => Some(fields),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Secret => "secret",
            FieldKind::Bytes => "bytes",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::List { .. } => "list",
            FieldKind::Object { .. } => "object",
        }
    }
}

fn default_required() -> bool {
    true
}

/// A declared configuration attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Required unless a default is declared
    #[serde(default = "default_required")]
    pub required: bool,
    /// Raw default used when no source provides a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Secret)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bytes)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn list(name: impl Into<String>, items: FieldKind) -> Self {
        Self::new(name, FieldKind::List { items: Box::new(items) })
    }

    pub fn object(name: impl Into<String>, fields: Schema) -> Self {
        Self::new(name, FieldKind::Object { fields })
    }

    /// Allow the field to be absent from every source
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Use `value` when no source provides the field
    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Nested schema if this is an object field
    pub fn nested(&self) -> Option<&Schema> {
        self.kind.nested()
    }

    pub fn is_complex(&self) -> bool {
        self.kind.is_complex()
    }
}

/// Ordered list of fields at one nesting level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<Field>,
}

#[derive(Deserialize)]
struct SchemaFile {
    fields: Schema,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a declared field by exact name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find the declared field `segment` names under `keys`' case rules,
    /// preferring an exact match
    pub fn find_matching(&self, segment: &str, keys: &KeyNormalizer) -> Option<&Field> {
        self.get(segment)
            .or_else(|| self.fields.iter().find(|f| keys.matches(segment, &f.name)))
    }

    /// Check that names are non-empty and unique at every level.
    ///
    /// Uniqueness is case-insensitive since sources match names that way.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.validate_level("<root>")
    }

    fn validate_level(&self, level: &str) -> Result<(), SchemaError> {
        let mut seen: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName { level: level.to_string() });
            }
            let folded = KeyNormalizer::new().fold(&field.name);
            if seen.contains(&folded) {
                return Err(SchemaError::DuplicateField {
                    name: field.name.clone(),
                    level: level.to_string(),
                });
            }
            seen.push(folded);

            let path = if level == "<root>" {
                field.name.clone()
            } else {
                format!("{}.{}", level, field.name)
            };
            validate_kind(&field.kind, &path)?;
        }
        Ok(())
    }

    /// Parse a schema document (`fields: [...]`) from YAML
    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile =
            serde_yaml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        file.fields.validate()?;
        Ok(file.fields)
    }

    /// Parse a schema document from JSON
    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile =
            serde_json::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        file.fields.validate()?;
        Ok(file.fields)
    }

    /// Load a schema file, picking the format from the extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}

fn validate_kind(kind: &FieldKind, path: &str) -> Result<(), SchemaError> {
    match kind {
        FieldKind::Object { fields } => fields.validate_level(path),
        FieldKind::List { items } => match items.as_ref() {
            FieldKind::Object { fields } if fields.is_empty() => Err(SchemaError::EmptyListItems {
                path: path.to_string(),
            }),
            other => validate_kind(other, path),
        },
        _ => Ok(()),
    }
}

impl FromIterator<Field> for Schema {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new()
            .field(Field::string("v0"))
            .field(Field::object(
                "sub_model",
                Schema::new()
                    .field(Field::string("v1"))
                    .field(Field::bytes("v2"))
                    .field(Field::object("deep", Schema::new().field(Field::string("v4")))),
            ))
    }

    #[test]
    fn test_builder() {
        let schema = sample();
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.get("sub_model").unwrap().is_complex());
        assert!(!schema.get("v0").unwrap().is_complex());
        assert!(schema.find_matching("SUB_MODEL", &KeyNormalizer::new()).is_some());
        assert!(schema
            .find_matching("SUB_MODEL", &KeyNormalizer::new().case_sensitive(true))
            .is_none());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_duplicate_detected_case_insensitively() {
        let schema = Schema::new().field(Field::string("name")).field(Field::integer("NAME"));
        assert!(matches!(schema.validate(), Err(SchemaError::DuplicateField { .. })));
    }

    #[test]
    fn test_duplicate_in_nested_level() {
        let schema = Schema::new().field(Field::object(
            "db",
            Schema::new().field(Field::string("host")).field(Field::string("host")),
        ));
        match schema.validate() {
            Err(SchemaError::DuplicateField { name, level }) => {
                assert_eq!(name, "host");
                assert_eq!(level, "db");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_same_name_at_different_levels_is_fine() {
        let schema = Schema::new()
            .field(Field::string("name"))
            .field(Field::object("inner", Schema::new().field(Field::string("name"))));
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
fields:
  - name: api_key
    type: secret
  - name: port
    type: integer
    default: 8080
    required: false
  - name: tags
    type: list
    items:
      type: string
  - name: db
    type: object
    fields:
      - name: host
        type: string
"#;
        let schema = Schema::from_yaml(yaml).unwrap();
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.get("api_key").unwrap().kind, FieldKind::Secret);
        let port = schema.get("port").unwrap();
        assert!(!port.required);
        assert_eq!(port.default, Some(serde_json::json!(8080)));
        assert_eq!(
            schema.get("tags").unwrap().kind,
            FieldKind::List { items: Box::new(FieldKind::String) }
        );
        assert!(schema.get("db").unwrap().nested().unwrap().get("host").is_some());
    }

    #[test]
    fn test_list_of_empty_objects_rejected() {
        let schema = Schema::new().field(Field::list(
            "servers",
            FieldKind::Object { fields: Schema::new() },
        ));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::EmptyListItems { path: "servers".to_string() })
        );
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{"fields": [{"name": "a", "type": "string"}, {"name": "A", "type": "string"}]}"#;
        assert!(matches!(Schema::from_json(json), Err(SchemaError::DuplicateField { .. })));
    }
}
