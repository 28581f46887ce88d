//! Secret backend adapter (HashiCorp Vault KV)
//!
//! - `SecretBackend`: narrow read capability over a path-addressed store
//! - `VaultKvClient`: KV v1/v2 over HTTP
//! - `MemoryBackend`: in-memory backend for tests
//! - `VaultSource`: the settings source, with a cached, contained fetch

mod backend;
mod client;
mod memory;
mod source;

pub use backend::{BackendError, BackendResult, SecretBackend, SecretSnapshot};
pub use client::{KvVersion, VaultKvClient, VaultKvClientBuilder, DEFAULT_MOUNT, DEFAULT_TIMEOUT};
pub use memory::MemoryBackend;
pub use source::{VaultConfig, VaultSource, VAULT_ADDR_ENV, VAULT_NAMESPACE_ENV, VAULT_TOKEN_ENV};
