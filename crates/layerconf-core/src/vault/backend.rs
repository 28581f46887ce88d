//! Secret backend capability

use thiserror::Error;

use crate::value::RawMap;

/// Errors from a single secret read
///
/// Messages name the path or status only, never secret material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Secret path '{path}' does not exist")]
    InvalidPath { path: String },

    #[error("Permission denied reading '{path}'")]
    Forbidden { path: String },

    #[error("Secret backend returned status {status}")]
    Status { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The key/value payload read from one secret path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSnapshot {
    data: RawMap,
    version: Option<u64>,
}

impl SecretSnapshot {
    pub fn new(data: RawMap) -> Self {
        Self { data, version: None }
    }

    /// Record the version the backend reported
    pub fn with_version(mut self, version: Option<u64>) -> Self {
        self.version = version;
        self
    }

    pub fn data(&self) -> &RawMap {
        &self.data
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A read-only, path-addressed secret store
///
/// Transport concerns (authentication, TLS, token renewal) live behind
/// this trait; the settings layer only ever reads one path.
pub trait SecretBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Read the secret at `path`, optionally at a specific version
    fn read_secret(&self, path: &str, version: Option<u64>) -> BackendResult<SecretSnapshot>;
}

impl<B: SecretBackend + ?Sized> SecretBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_secret(&self, path: &str, version: Option<u64>) -> BackendResult<SecretSnapshot> {
        (**self).read_secret(path, version)
    }
}

impl<B: SecretBackend + ?Sized> SecretBackend for std::sync::Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_secret(&self, path: &str, version: Option<u64>) -> BackendResult<SecretSnapshot> {
        (**self).read_secret(path, version)
    }
}
