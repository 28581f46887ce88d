//! Environment variable source

use once_cell::sync::OnceCell;

use super::flat::{FlatIndex, FlatOptions};
use crate::error::SettingsResult;
use crate::keys::KeyNormalizer;
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{FieldLookup, RawValue};

/// Source that reads a flat key space of environment variables
///
/// Keys are matched case-insensitively after stripping the optional prefix.
/// With a nested delimiter, object fields are assembled from delimited keys:
///
/// ```
/// use layerconf_core::{EnvSource, Field, Schema, SettingsSource};
///
/// let env = EnvSource::from_vars([("IMAD_DB__HOST", "localhost")])
///     .with_prefix("IMAD_")
///     .with_nested_delimiter("__");
///
/// let db = Field::object("db", Schema::new().field(Field::string("host")));
/// let found = env.get(&db).unwrap().unwrap();
/// assert_eq!(found.value.as_map().unwrap()["host"].as_str(), Some("localhost"));
/// ```
///
/// The variables are captured once, at construction.
pub struct EnvSource {
    name: String,
    vars: Vec<(String, RawValue)>,
    options: FlatOptions,
    index: OnceCell<FlatIndex>,
}

impl EnvSource {
    /// Snapshot the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn new() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Build from explicit variables (useful for testing)
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_raw(
            "env",
            vars.into_iter()
                .map(|(k, v)| (k.into(), RawValue::Str(v.into())))
                .collect(),
        )
    }

    /// Build from raw entries under a custom source name.
    ///
    /// Entries are sorted by key so that lookups never depend on the order
    /// the platform reports them in.
    pub(crate) fn from_raw(name: impl Into<String>, mut vars: Vec<(String, RawValue)>) -> Self {
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.into(),
            vars,
            options: FlatOptions::default(),
            index: OnceCell::new(),
        }
    }

    /// Require keys to start with `prefix`; the prefix is stripped before matching
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.keys = self.options.keys.clone().with_prefix(prefix);
        self.reset()
    }

    /// Decode nested object fields from keys joined by `delimiter`
    pub fn with_nested_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.delimiter = Some(delimiter.into());
        self.reset()
    }

    /// Match keys case-sensitively
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.options.keys = self.options.keys.clone().case_sensitive(case_sensitive);
        self.reset()
    }

    /// Treat empty values as unset
    pub fn ignore_empty(mut self, ignore: bool) -> Self {
        self.options.ignore_empty = ignore;
        self.reset()
    }

    /// Rename the source (shown in provenance)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn keys(&self) -> &KeyNormalizer {
        &self.options.keys
    }

    /// Number of raw entries captured
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn reset(mut self) -> Self {
        self.index = OnceCell::new();
        self
    }

    fn index(&self) -> &FlatIndex {
        self.index
            .get_or_init(|| FlatIndex::build(&self.options, &self.vars))
    }
}

// Values may be secrets, so only the shape is printed
impl std::fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSource")
            .field("name", &self.name)
            .field("vars", &format!("[{} entries]", self.vars.len()))
            .field("options", &self.options)
            .finish()
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsSource for EnvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        let found = self.index().lookup(field)?;
        tracing::trace!(
            source = %self.name,
            field = %field.name,
            found = found.is_some(),
            "flat source lookup"
        );
        Ok(found)
    }
}
