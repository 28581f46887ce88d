//! In-memory secret backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::backend::{BackendError, BackendResult, SecretBackend, SecretSnapshot};
use crate::value::{RawMap, RawValue};

/// Secret backend holding its secrets in memory, for tests and local runs
///
/// Can be told to fail every read, and counts how many reads were made.
///
/// # Example
///
/// ```
/// use layerconf_core::vault::{MemoryBackend, SecretBackend};
///
/// let backend = MemoryBackend::new().with_secret("app", [("API_KEY", "k")]);
/// assert_eq!(backend.read_secret("app", None).unwrap().len(), 1);
/// assert_eq!(backend.reads(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    secrets: HashMap<String, RawMap>,
    failure: Option<BackendError>,
    reads: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret at `path`
    pub fn with_secret<I, K, V>(mut self, path: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawValue>,
    {
        let data = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.secrets.insert(path.into(), data);
        self
    }

    /// Make every read fail with `error`
    pub fn failing(mut self, error: BackendError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of reads made so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SecretBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn read_secret(&self, path: &str, version: Option<u64>) -> BackendResult<SecretSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.secrets
            .get(path)
            .map(|data| SecretSnapshot::new(data.clone()).with_version(version))
            .ok_or_else(|| BackendError::InvalidPath {
                path: path.to_string(),
            })
    }
}
