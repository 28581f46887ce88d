//! HashiCorp Vault KV client over HTTP

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::backend::{BackendError, BackendResult, SecretBackend, SecretSnapshot};
use crate::value::RawValue;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default KV mount point
pub const DEFAULT_MOUNT: &str = "secret";

/// KV secrets engine version
///
/// Written as `1`/`2` or `"v1"`/`"v2"` in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    #[default]
    V2,
}

impl Serialize for KvVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            KvVersion::V1 => 1,
            KvVersion::V2 => 2,
        })
    }
}

impl<'de> Deserialize<'de> for KvVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        let version = match Repr::deserialize(deserializer)? {
            Repr::Number(n) => n.to_string(),
            Repr::Text(text) => text.trim_start_matches(['v', 'V']).to_string(),
        };
        match version.as_str() {
            "1" => Ok(KvVersion::V1),
            "2" => Ok(KvVersion::V2),
            other => Err(de::Error::custom(format!("unsupported KV version '{}'", other))),
        }
    }
}

/// Blocking Vault KV reader
///
/// # Example
///
/// ```no_run
/// use layerconf_core::vault::{SecretBackend, VaultKvClient};
/// use secrecy::SecretString;
///
/// let token = SecretString::new("s.token".into());
/// let client = VaultKvClient::new("http://127.0.0.1:8200", token).unwrap();
/// let snapshot = client.read_secret("app/prod", None).unwrap();
/// ```
pub struct VaultKvClient {
    address: String,
    token: SecretString,
    namespace: Option<String>,
    mount: String,
    kv_version: KvVersion,
    http: reqwest::blocking::Client,
}

impl VaultKvClient {
    /// Client for the default `secret` KV v2 mount with a 5 second timeout
    pub fn new(address: impl Into<String>, token: SecretString) -> BackendResult<Self> {
        Self::builder(address, token).build()
    }

    pub fn builder(address: impl Into<String>, token: SecretString) -> VaultKvClientBuilder {
        VaultKvClientBuilder {
            address: address.into(),
            token,
            namespace: None,
            mount: DEFAULT_MOUNT.to_string(),
            kv_version: KvVersion::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn kv_version(&self) -> KvVersion {
        self.kv_version
    }

    fn url(&self, path: &str, version: Option<u64>) -> String {
        let base = self.address.trim_end_matches('/');
        let mount = self.mount.trim_matches('/');
        let path = path.trim_matches('/');
        match self.kv_version {
            KvVersion::V1 => format!("{}/v1/{}/{}", base, mount, path),
            KvVersion::V2 => match version {
                Some(v) => format!("{}/v1/{}/data/{}?version={}", base, mount, path, v),
                None => format!("{}/v1/{}/data/{}", base, mount, path),
            },
        }
    }

    fn parse_body(&self, body: Value) -> BackendResult<SecretSnapshot> {
        let outer = body
            .get("data")
            .ok_or_else(|| BackendError::InvalidResponse("missing 'data'".to_string()))?;
        let (payload, version) = match self.kv_version {
            KvVersion::V1 => (outer.clone(), None),
            KvVersion::V2 => {
                let inner = outer
                    .get("data")
                    .ok_or_else(|| BackendError::InvalidResponse("missing 'data.data'".to_string()))?;
                let version = outer
                    .get("metadata")
                    .and_then(|m| m.get("version"))
                    .and_then(Value::as_u64);
                (inner.clone(), version)
            }
        };

        match RawValue::from_json(payload) {
            Some(RawValue::Map(data)) => Ok(SecretSnapshot::new(data).with_version(version)),
            // KV v2 reports a deleted version as `data: null`
            None => Ok(SecretSnapshot::default().with_version(version)),
            Some(other) => Err(BackendError::InvalidResponse(format!(
                "secret payload is a {}, expected a mapping",
                other.kind_name()
            ))),
        }
    }
}

impl std::fmt::Debug for VaultKvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKvClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("mount", &self.mount)
            .field("kv_version", &self.kv_version)
            .finish_non_exhaustive()
    }
}

impl SecretBackend for VaultKvClient {
    fn name(&self) -> &str {
        "vault"
    }

    fn read_secret(&self, path: &str, version: Option<u64>) -> BackendResult<SecretSnapshot> {
        let url = self.url(path, version);
        tracing::debug!(mount = %self.mount, path = %path, ?version, "reading secret");

        let mut request = self
            .http
            .get(&url)
            .header("X-Vault-Token", self.token.expose_secret());
        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }

        let response = request
            .send()
            .map_err(|e| BackendError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        match status.as_u16() {
            404 => {
                return Err(BackendError::InvalidPath {
                    path: path.to_string(),
                })
            }
            403 => {
                return Err(BackendError::Forbidden {
                    path: path.to_string(),
                })
            }
            _ if !status.is_success() => {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.without_url().to_string()))?;
        self.parse_body(body)
    }
}

/// Builder for [`VaultKvClient`]
pub struct VaultKvClientBuilder {
    address: String,
    token: SecretString,
    namespace: Option<String>,
    mount: String,
    kv_version: KvVersion,
    timeout: Duration,
}

impl VaultKvClientBuilder {
    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|n| !n.is_empty());
        self
    }

    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn kv_version(mut self, kv_version: KvVersion) -> Self {
        self.kv_version = kv_version;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> BackendResult<VaultKvClient> {
        let http = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(VaultKvClient {
            address: self.address,
            token: self.token,
            namespace: self.namespace,
            mount: self.mount,
            kv_version: self.kv_version,
            http,
        })
    }
}
