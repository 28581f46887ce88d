//! Explicit override source

use crate::error::SettingsResult;
use crate::keys::KeyNormalizer;
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{deep_merge, FieldLookup, RawMap, RawValue};

/// Values passed explicitly by the caller
///
/// This is the highest-priority source when present. Names match exactly
/// first, then case-insensitively unless [`case_sensitive`](Self::case_sensitive)
/// is set.
///
/// # Example
///
/// ```
/// use layerconf_core::{Field, OverrideSource, SettingsSource};
///
/// let overrides = OverrideSource::new()
///     .set("app_name", "svc")
///     .set_path("db.host", "db.internal");
///
/// let found = overrides.get(&Field::string("APP_NAME")).unwrap().unwrap();
/// assert_eq!(found.value.as_str(), Some("svc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSource {
    values: RawMap,
    keys: KeyNormalizer,
}

impl OverrideSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing mapping
    pub fn from_map(values: RawMap) -> Self {
        Self {
            values,
            keys: KeyNormalizer::new(),
        }
    }

    /// Only match names exactly
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.keys = self.keys.case_sensitive(case_sensitive);
        self
    }

    /// Set a top-level value
    pub fn set(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set a value at a dotted path (`db.host`), merging with what is there
    pub fn set_path(mut self, path: &str, value: impl Into<RawValue>) -> Self {
        let mut segments = path.split('.').filter(|s| !s.is_empty()).rev();
        let Some(last) = segments.next() else {
            return self;
        };
        let mut node = value.into();
        let mut head = last.to_string();
        for segment in segments {
            let mut parent = RawMap::new();
            parent.insert(head, node);
            node = RawValue::Map(parent);
            head = segment.to_string();
        }
        match self.values.get_mut(&head) {
            Some(existing) => deep_merge(existing, node),
            None => {
                self.values.insert(head, node);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &RawMap {
        &self.values
    }

    fn find(&self, name: &str) -> Option<(&String, &RawValue)> {
        self.keys.find_in(&self.values, name)
    }
}

impl SettingsSource for OverrideSource {
    fn name(&self) -> &str {
        "overrides"
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        Ok(self.find(&field.name).map(|(key, value)| {
            let complex = field.is_complex() && matches!(value, RawValue::Str(_));
            FieldLookup::new(value.clone(), key.clone()).complex(complex)
        }))
    }
}

impl From<RawMap> for OverrideSource {
    fn from(values: RawMap) -> Self {
        Self::from_map(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, Schema};

    #[test]
    fn test_exact_match_preferred() {
        let overrides = OverrideSource::new().set("Name", "upper").set("name", "lower");
        let found = overrides.get(&Field::string("name")).unwrap().unwrap();
        assert_eq!(found.value.as_str(), Some("lower"));

        let found = overrides.get(&Field::string("NAME")).unwrap().unwrap();
        assert_eq!(found.key, "Name");
    }

    #[test]
    fn test_case_sensitive_matches_exactly() {
        let overrides = OverrideSource::new().set("API_KEY", "X").case_sensitive(true);
        assert!(overrides.get(&Field::secret("api_key")).unwrap().is_none());
        assert!(overrides.get(&Field::secret("API_KEY")).unwrap().is_some());
    }

    #[test]
    fn test_missing_is_none() {
        let overrides = OverrideSource::new();
        assert!(overrides.is_empty());
        assert!(overrides.get(&Field::string("x")).unwrap().is_none());
    }

    #[test]
    fn test_set_path_builds_and_merges() {
        let overrides = OverrideSource::new()
            .set_path("db.host", "h")
            .set_path("db.pool.size", "4");
        let db = Field::object("db", Schema::new().field(Field::string("host")));
        let found = overrides.get(&db).unwrap().unwrap();
        let map = found.value.as_map().unwrap();
        assert_eq!(map["host"].as_str(), Some("h"));
        assert_eq!(map["pool"].as_map().unwrap()["size"].as_str(), Some("4"));
        assert!(!found.complex);
    }

    #[test]
    fn test_string_for_list_is_complex() {
        let overrides = OverrideSource::new().set("ports", "[1]");
        let found = overrides
            .get(&Field::list("ports", FieldKind::Integer))
            .unwrap()
            .unwrap();
        assert!(found.complex);
    }
}
