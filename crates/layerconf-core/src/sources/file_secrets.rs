//! Secrets directory source
//!
//! One file per field, named after the field, holding the value
//! (the layout used by Docker and Kubernetes secret mounts).

use std::path::{Path, PathBuf};

use super::env::EnvSource;
use crate::error::SettingsResult;
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{FieldLookup, RawValue};

/// Source reading values from files in a directory
///
/// A missing or unreadable directory yields an empty source; a warning is
/// logged and resolution carries on with the other sources.
#[derive(Debug)]
pub struct FileSecretSource {
    dir: PathBuf,
    inner: EnvSource,
}

impl FileSecretSource {
    /// Scan `dir` once; file contents are read eagerly.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let vars = scan(&dir);
        tracing::debug!(dir = %dir.display(), files = vars.len(), "scanned secrets directory");
        Self {
            inner: EnvSource::from_raw("secrets", vars),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner = self.inner.with_prefix(prefix);
        self
    }

    pub fn with_nested_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.inner = self.inner.with_nested_delimiter(delimiter);
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.inner = self.inner.case_sensitive(case_sensitive);
        self
    }
}

fn scan(dir: &Path) -> Vec<(String, RawValue)> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "secrets directory does not exist, no secrets loaded");
        return Vec::new();
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read secrets directory");
            return Vec::new();
        }
    };

    let mut vars = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        match std::fs::read(&path) {
            Ok(bytes) => vars.push((name, file_value(bytes))),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "cannot read secret file, skipping");
            }
        }
    }
    vars
}

/// Text files are trimmed; anything else is kept as bytes.
fn file_value(bytes: Vec<u8>) -> RawValue {
    match String::from_utf8(bytes) {
        Ok(text) => RawValue::Str(text.trim().to_string()),
        Err(e) => RawValue::Bytes(e.into_bytes()),
    }
}

impl SettingsSource for FileSecretSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        self.inner.get(field)
    }
}
