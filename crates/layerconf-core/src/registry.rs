//! Source registry for creating sources by name
//!
//! Lets a precedence chain be declared as a list of names in
//! [`SettingsConfig::sources`](crate::SettingsConfig). Built-in names are
//! `env`, `dotenv`, `files`, `vault` and `secrets`; applications can
//! register their own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::config::SettingsConfig;
use crate::error::{SettingsError, SettingsResult};
use crate::source::SettingsSource;

/// Factory creating a source from the configuration.
///
/// Returns `Ok(None)` when the configuration does not set the source up
/// (for example no `env_file`), in which case it is left out of the chain.
pub type SourceFactory =
    Arc<dyn Fn(&SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> + Send + Sync>;

/// A registered source
pub struct SourceDefinition {
    pub name: String,
    pub description: String,
    pub factory: SourceFactory,
    pub builtin: bool,
}

impl std::fmt::Debug for SourceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("builtin", &self.builtin)
            .finish()
    }
}

fn builtin(name: &str, description: &str, factory: SourceFactory) -> (String, SourceDefinition) {
    (
        name.to_string(),
        SourceDefinition {
            name: name.to_string(),
            description: description.to_string(),
            factory,
            builtin: true,
        },
    )
}

fn boxed<S: SettingsSource + 'static>(source: Option<S>) -> Option<Box<dyn SettingsSource>> {
    source.map(|s| Box::new(s) as Box<dyn SettingsSource>)
}

fn env_source(config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    Ok(boxed(Some(config.env_source())))
}

fn dotenv_source(config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    Ok(boxed(config.dotenv_source()?))
}

fn files_source(config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    Ok(boxed(config.files_source()?))
}

fn vault_source(config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    Ok(boxed(config.vault_source()?))
}

fn secrets_source(config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    Ok(boxed(config.secrets_source()))
}

static REGISTRY: Lazy<RwLock<HashMap<String, SourceDefinition>>> = Lazy::new(|| {
    let map = HashMap::from([
        builtin("env", "Process environment variables", Arc::new(env_source)),
        builtin("dotenv", "Dotenv file (env_file)", Arc::new(dotenv_source)),
        builtin(
            "files",
            "YAML, JSON or TOML settings files (settings_files)",
            Arc::new(files_source),
        ),
        builtin("vault", "HashiCorp Vault KV secret (vault)", Arc::new(vault_source)),
        builtin(
            "secrets",
            "Directory of secret files (secrets_dir)",
            Arc::new(secrets_source),
        ),
    ]);
    RwLock::new(map)
});

// A panic while holding the lock leaves the map itself intact
fn read() -> RwLockReadGuard<'static, HashMap<String, SourceDefinition>> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner())
}

fn write() -> RwLockWriteGuard<'static, HashMap<String, SourceDefinition>> {
    REGISTRY.write().unwrap_or_else(|e| e.into_inner())
}

/// Register a source factory under `name`, replacing any previous one
///
/// # Example
///
/// ```
/// use layerconf_core::registry::{create_source, register_source};
/// use layerconf_core::{OverrideSource, SettingsConfig, SettingsResult, SettingsSource};
///
/// fn fixed(_config: &SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
///     Ok(Some(Box::new(OverrideSource::new().set("region", "eu"))))
/// }
///
/// register_source("fixed", "Fixed values", fixed);
/// let source = create_source("fixed", &SettingsConfig::default()).unwrap().unwrap();
/// assert_eq!(source.name(), "overrides");
/// ```
pub fn register_source<F>(name: &str, description: &str, factory: F)
where
    F: Fn(&SettingsConfig) -> SettingsResult<Option<Box<dyn SettingsSource>>>
        + Send
        + Sync
        + 'static,
{
    write().insert(
        name.to_string(),
        SourceDefinition {
            name: name.to_string(),
            description: description.to_string(),
            factory: Arc::new(factory),
            builtin: false,
        },
    );
}

/// Create the source registered as `name`.
///
/// The factory runs after the registry lock is released, so it may itself
/// use the registry.
pub fn create_source(
    name: &str,
    config: &SettingsConfig,
) -> SettingsResult<Option<Box<dyn SettingsSource>>> {
    let factory = read()
        .get(name)
        .map(|definition| Arc::clone(&definition.factory))
        .ok_or_else(|| SettingsError::UnknownSource(name.to_string()))?;
    factory(config)
}

/// Registered sources as `(name, description, builtin)`, sorted by name
pub fn list_sources() -> Vec<(String, String, bool)> {
    let mut sources: Vec<_> = read()
        .values()
        .map(|def| (def.name.clone(), def.description.clone(), def.builtin))
        .collect();
    sources.sort();
    sources
}

pub fn has_source(name: &str) -> bool {
    read().contains_key(name)
}

/// Remove a registered source (mainly for testing)
pub fn unregister_source(name: &str) -> bool {
    write().remove(name).is_some()
}
