//! Settings assembly
//!
//! [`SettingsBuilder`] ties the pieces together: it assembles the chain,
//! runs the precedence merge and validates the merged mapping.
//!
//! ```
//! use layerconf_core::{EnvSource, Field, Schema, SettingsBuilder};
//!
//! let schema = Schema::new()
//!     .field(Field::secret("api_key"))
//!     .field(Field::string("app_name"));
//!
//! let settings = SettingsBuilder::new(schema)
//!     .set("api_key", "X")
//!     .source(EnvSource::from_vars([("API_KEY", "Y"), ("APP_NAME", "svc")]))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(settings.get_str("app_name"), Some("svc"));
//! assert_eq!(settings.source_of("api_key").unwrap().source, "overrides");
//! ```

mod resolved;
mod validate;

pub use resolved::{ResolvedSettings, SettingValue, REDACTED};
pub use validate::{FieldError, FieldProblem, ValidationErrors};

use crate::error::SettingsResult;
use crate::resolver::{MergedMapping, PrecedenceChain, PrecedenceResolver};
use crate::schema::Schema;
use crate::source::SettingsSource;
use crate::sources::OverrideSource;
use crate::value::RawValue;

/// Builds [`ResolvedSettings`] from a schema and a list of sources
pub struct SettingsBuilder {
    schema: Schema,
    overrides: OverrideSource,
    sources: Vec<Box<dyn SettingsSource>>,
}

impl SettingsBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            overrides: OverrideSource::new(),
            sources: Vec::new(),
        }
    }

    /// Replace the explicit overrides
    pub fn overrides(mut self, overrides: OverrideSource) -> Self {
        self.overrides = overrides;
        self
    }

    /// Add one explicit override
    pub fn set(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.overrides = self.overrides.set(name, value);
        self
    }

    /// Append a source; sources added first take priority
    pub fn source(mut self, source: impl SettingsSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Append several boxed sources, keeping their order
    pub fn sources(mut self, sources: impl IntoIterator<Item = Box<dyn SettingsSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Overrides (when any are set) followed by the added sources
    pub fn into_chain(self) -> SettingsResult<(Schema, PrecedenceChain)> {
        let mut sources = self.sources;
        if !self.overrides.is_empty() {
            sources.insert(0, Box::new(self.overrides));
        }
        Ok((self.schema, PrecedenceChain::new(sources)?))
    }

    /// Resolve and validate
    pub fn build(self) -> SettingsResult<ResolvedSettings> {
        let (schema, chain) = self.into_chain()?;
        resolve(&schema, &chain)
    }
}

impl std::fmt::Debug for SettingsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBuilder")
            .field("fields", &self.schema.fields().len())
            .field("overrides", &self.overrides.len())
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Resolve `schema` against an existing chain
pub fn resolve(schema: &Schema, chain: &PrecedenceChain) -> SettingsResult<ResolvedSettings> {
    schema.validate()?;
    let merged = PrecedenceResolver::new(chain).resolve(schema)?;
    validate_merged(schema, merged)
}

/// Validate an already merged mapping
pub fn validate_merged(schema: &Schema, merged: MergedMapping) -> SettingsResult<ResolvedSettings> {
    let (raw, provenance) = merged.into_parts();
    let values = validate::validate(schema, &raw)?;
    Ok(ResolvedSettings::new(values, provenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SettingsError;
    use crate::schema::Field;
    use crate::sources::EnvSource;

    #[test]
    fn test_overrides_go_first() {
        let settings = SettingsBuilder::new(Schema::new().field(Field::string("name")))
            .source(EnvSource::from_vars([("NAME", "env")]))
            .set("name", "override")
            .build()
            .unwrap();
        assert_eq!(settings.get_str("name"), Some("override"));
    }

    #[test]
    fn test_no_sources_is_empty_chain() {
        let result = SettingsBuilder::new(Schema::new().field(Field::string("name"))).build();
        assert!(matches!(result, Err(SettingsError::EmptyChain)));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let schema = Schema::new().field(Field::string("a")).field(Field::string("A"));
        let result = SettingsBuilder::new(schema).set("a", "1").build();
        assert!(matches!(result, Err(SettingsError::Schema(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let schema = Schema::new()
            .field(Field::string("api_key"))
            .field(Field::string("app_name"));
        let err = SettingsBuilder::new(schema)
            .source(EnvSource::from_vars([("APP_NAME", "svc")]))
            .build()
            .unwrap_err();
        match err {
            SettingsError::Validation(errors) => assert_eq!(errors.paths(), vec!["api_key"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_default_has_no_provenance() {
        let schema = Schema::new().field(Field::integer("port").with_default(8080));
        let settings = SettingsBuilder::new(schema)
            .source(EnvSource::from_vars(Vec::<(String, String)>::new()))
            .build()
            .unwrap();
        assert_eq!(settings.get("port").unwrap().as_i64(), Some(8080));
        assert!(settings.source_of("port").is_none());
    }
}
