//! Secret backend settings source

use std::time::Duration;

use once_cell::sync::OnceCell;
use secrecy::SecretString;
use serde::Deserialize;

use super::backend::{BackendError, SecretBackend, SecretSnapshot};
use super::client::{KvVersion, VaultKvClient, DEFAULT_MOUNT};
use crate::error::{SettingsError, SettingsResult};
use crate::keys::KeyNormalizer;
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{FieldLookup, RawValue};

pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";
pub const VAULT_NAMESPACE_ENV: &str = "VAULT_NAMESPACE";

mod secret_string {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(|s| SecretString::new(s.into())))
    }
}

/// Where and how to read the secret
///
/// `address`, `token` and `namespace` fall back to `VAULT_ADDR`,
/// `VAULT_TOKEN` and `VAULT_NAMESPACE`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub address: Option<String>,
    #[serde(deserialize_with = "secret_string::deserialize")]
    pub token: Option<SecretString>,
    pub namespace: Option<String>,
    pub mount: String,
    /// Secret path relative to the mount
    pub path: String,
    /// Specific secret version (KV v2 only)
    pub version: Option<u64>,
    pub kv_version: KvVersion,
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: None,
            token: None,
            namespace: None,
            mount: DEFAULT_MOUNT.to_string(),
            path: String::new(),
            version: None,
            kv_version: KvVersion::default(),
            timeout_secs: 5,
        }
    }
}

impl VaultConfig {
    /// Config for `path` on the default mount
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Build the HTTP client, resolving address and token.
    ///
    /// Fails when either is missing from both the config and the
    /// environment.
    pub fn client(&self) -> SettingsResult<VaultKvClient> {
        let address = non_empty(self.address.clone())
            .or_else(|| env_var(VAULT_ADDR_ENV))
            .ok_or_else(|| {
                SettingsError::backend_config(format!(
                    "no address given and {} is not set",
                    VAULT_ADDR_ENV
                ))
            })?;
        let token = match &self.token {
            Some(token) => token.clone(),
            None => env_var(VAULT_TOKEN_ENV)
                .map(|t| SecretString::new(t.into()))
                .ok_or_else(|| {
                    SettingsError::backend_config(format!(
                        "no token given and {} is not set",
                        VAULT_TOKEN_ENV
                    ))
                })?,
        };
        let namespace = non_empty(self.namespace.clone()).or_else(|| env_var(VAULT_NAMESPACE_ENV));

        VaultKvClient::builder(address, token)
            .namespace(namespace)
            .mount(self.mount.clone())
            .kv_version(self.kv_version)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| SettingsError::backend_config(e.to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

/// Source backed by one secret read from a secret backend
///
/// The secret is read once, on first lookup, and the outcome is cached for
/// the lifetime of the source. A failed read is contained: a warning is
/// logged and every lookup reports absence.
///
/// ```
/// use layerconf_core::vault::{BackendError, MemoryBackend, VaultSource};
/// use layerconf_core::{Field, SettingsSource};
///
/// let backend = MemoryBackend::new().failing(BackendError::Forbidden { path: "app".into() });
/// let source = VaultSource::with_backend(backend, "app", None);
///
/// assert!(source.get(&Field::string("api_key")).unwrap().is_none());
/// assert!(source.fetch().is_err());
/// ```
pub struct VaultSource {
    backend: Box<dyn SecretBackend>,
    path: String,
    version: Option<u64>,
    keys: KeyNormalizer,
    snapshot: OnceCell<Result<SecretSnapshot, BackendError>>,
}

impl VaultSource {
    /// Connect to Vault over HTTP
    pub fn connect(config: &VaultConfig) -> SettingsResult<Self> {
        let client = config.client()?;
        tracing::debug!(
            address = %client.address(),
            mount = %client.mount(),
            path = %config.path,
            "configured vault source"
        );
        Ok(Self::with_backend(client, config.path.clone(), config.version))
    }

    /// Use any secret backend
    pub fn with_backend(
        backend: impl SecretBackend + 'static,
        path: impl Into<String>,
        version: Option<u64>,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            path: path.into(),
            version,
            keys: KeyNormalizer::new(),
            snapshot: OnceCell::new(),
        }
    }

    /// Only match payload keys that equal the field name exactly
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.keys = self.keys.case_sensitive(case_sensitive);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Outcome of the single read, performing it on first call
    pub fn fetch(&self) -> Result<&SecretSnapshot, &BackendError> {
        self.snapshot
            .get_or_init(|| {
                let result = self.backend.read_secret(&self.path, self.version);
                match &result {
                    Ok(snapshot) => tracing::debug!(
                        backend = %self.backend.name(),
                        path = %self.path,
                        keys = snapshot.len(),
                        "fetched secret"
                    ),
                    Err(e) => tracing::warn!(
                        backend = %self.backend.name(),
                        path = %self.path,
                        error = %e,
                        "secret backend unavailable, continuing without it"
                    ),
                }
                result
            })
            .as_ref()
    }
}

impl std::fmt::Debug for VaultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSource")
            .field("backend", &self.backend.name())
            .field("path", &self.path)
            .field("version", &self.version)
            .field("fetched", &self.snapshot.get().is_some())
            .finish()
    }
}

impl SettingsSource for VaultSource {
    fn name(&self) -> &str {
        "vault"
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        let Ok(snapshot) = self.fetch() else {
            return Ok(None);
        };
        Ok(self.keys.find_in(snapshot.data(), &field.name).map(|(key, value)| {
            let complex = field.is_complex() && matches!(value, RawValue::Str(_));
            FieldLookup::new(value.clone(), key.clone()).complex(complex)
        }))
    }
}
