//! Error types for settings resolution

use std::path::PathBuf;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::schema::SchemaError;
use crate::settings::ValidationErrors;

/// Errors that can occur while assembling settings
///
/// Failures of optional remote sources (the secret backend, the secrets
/// directory) never show up here: those adapters contain them and report
/// absence instead.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Precedence chain requires at least one source")]
    EmptyChain,

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    /// A source the caller marked as mandatory could not be read
    #[error("Source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Secret backend address or token could not be resolved
    #[error("Secret backend not configured: {0}")]
    BackendConfig(String),

    /// Failed to parse a dotenv file.
    ///
    /// Only the position of the failure is reported, never the line itself.
    #[error("Failed to parse .env file {path} at position {error_index}")]
    DotenvParse { path: PathBuf, error_index: usize },

    #[error("Failed to parse settings file {path}: {message}")]
    SettingsFileParse { path: PathBuf, message: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deserialize settings: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl SettingsError {
    /// Create a source unavailable error
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend configuration error
    pub fn backend_config(message: impl Into<String>) -> Self {
        Self::BackendConfig(message.into())
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;
