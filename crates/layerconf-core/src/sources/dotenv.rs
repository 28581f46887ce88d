//! Dotenv file source
//!
//! Parses a `KEY=value` file once, up front, and answers lookups from the
//! parsed map with the same prefix, case and nesting rules as `EnvSource`.
//!
//! Invariants:
//! - A missing file is an empty source unless the file is marked required.
//! - Parse errors report the position only, never the offending line.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::env::EnvSource;
use crate::error::{SettingsError, SettingsResult};
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{FieldLookup, RawValue};

/// Text encoding of a dotenv file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DotenvEncoding {
    /// UTF-8; a leading byte order mark is skipped
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// ISO-8859-1
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl DotenvEncoding {
    fn decode(self, bytes: Vec<u8>) -> Option<String> {
        match self {
            DotenvEncoding::Utf8 => {
                let bytes = match bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
                    Some(rest) => rest.to_vec(),
                    None => bytes,
                };
                String::from_utf8(bytes).ok()
            }
            DotenvEncoding::Latin1 => Some(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Options for loading a dotenv file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DotenvOptions {
    pub encoding: DotenvEncoding,
    /// Fail instead of yielding an empty source when the file is missing
    pub required: bool,
}

impl DotenvOptions {
    pub fn encoding(mut self, encoding: DotenvEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Source backed by a parsed dotenv file
///
/// # Example
///
/// ```no_run
/// use layerconf_core::{DotenvOptions, DotenvSource};
///
/// let source = DotenvSource::load("app.dev.conf", DotenvOptions::default())
///     .unwrap()
///     .with_prefix("IMAD_");
/// ```
#[derive(Debug)]
pub struct DotenvSource {
    path: PathBuf,
    inner: EnvSource,
}

impl DotenvSource {
    /// Read and parse the file at `path`
    pub fn load(path: impl AsRef<Path>, options: DotenvOptions) -> SettingsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let vars = read_vars(&path, options)?;
        tracing::debug!(path = %path.display(), entries = vars.len(), "loaded dotenv file");
        Ok(Self {
            inner: EnvSource::from_raw("dotenv", vars),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of parsed entries
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

    pub fn ignore_empty(mut self, ignore: bool) -> Self {
        self.inner = self.inner.ignore_empty(ignore);
        self
    }
}

fn read_vars(path: &Path, options: DotenvOptions) -> SettingsResult<Vec<(String, RawValue)>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if options.required {
                return Err(SettingsError::unavailable(
                    "dotenv",
                    format!("{} not found", path.display()),
                ));
            }
            tracing::debug!(path = %path.display(), "dotenv file not found, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(SettingsError::Io(e)),
    };

    let text = options.encoding.decode(bytes).ok_or_else(|| {
        SettingsError::unavailable("dotenv", format!("{} is not valid UTF-8", path.display()))
    })?;

    let mut vars = Vec::new();
    for item in dotenvy::from_read_iter(Cursor::new(text.into_bytes())) {
        match item {
            Ok((key, value)) => vars.push((key, RawValue::Str(value))),
            Err(dotenvy::Error::LineParse(_, error_index)) => {
                return Err(SettingsError::DotenvParse {
                    path: path.to_path_buf(),
                    error_index,
                })
            }
            Err(dotenvy::Error::Io(e)) => return Err(SettingsError::Io(e)),
            Err(_) => {
                return Err(SettingsError::unavailable(
                    "dotenv",
                    format!("failed to load {}", path.display()),
                ))
            }
        }
    }
    Ok(vars)
}

impl SettingsSource for DotenvSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        self.inner.get(field)
    }
}
