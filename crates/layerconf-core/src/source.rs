//! The settings source capability

use crate::error::SettingsResult;
use crate::schema::Field;
use crate::value::FieldLookup;

/// Trait for anything that can provide raw values for declared fields
///
/// Implementations:
/// - Explicit overrides (`OverrideSource`)
/// - Process environment (`EnvSource`)
/// - Dotenv files (`DotenvSource`)
/// - Structured settings files (`FileSettingsSource`)
/// - Secret backends (`VaultSource`)
/// - Secrets directories (`FileSecretSource`)
///
/// # Example
///
/// ```
/// use layerconf_core::{Field, SettingsSource, OverrideSource};
///
/// let source = OverrideSource::new().set("app_name", "svc");
/// let found = source.get(&Field::string("app_name")).unwrap().unwrap();
/// assert_eq!(found.value.as_str(), Some("svc"));
/// ```
pub trait SettingsSource: Send + Sync {
    /// Human-readable name of this source, used for provenance and logs
    fn name(&self) -> &str;

    /// Look up the raw value for a top-level field.
    ///
    /// Absence is `Ok(None)`, never an error. Errors are reserved for
    /// malformed data (e.g. a nested key collision) and for mandatory
    /// sources that cannot be read.
    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>>;
}

impl<S: SettingsSource + ?Sized> SettingsSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        (**self).get(field)
    }
}

impl<S: SettingsSource + ?Sized> SettingsSource for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        (**self).get(field)
    }
}
