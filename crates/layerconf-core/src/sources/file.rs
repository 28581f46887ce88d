//! Structured settings file source (YAML, JSON, TOML)
//!
//! Several files may be listed; they are merged in order, later files
//! overriding earlier ones per leaf. When an environment is selected, each
//! file is read as a set of sections:
//!
//! ```yaml
//! default:
//!   port: 8080
//!   db:
//!     host: localhost
//! production:
//!   db:
//!     host: db.internal
//! ```
//!
//! The `default` section is applied first, then the selected environment,
//! then `global`. Without an environment the whole document is used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};
use crate::keys::KeyNormalizer;
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::{deep_merge_maps, FieldLookup, RawMap, RawValue};

/// Section applied before the selected environment
pub const DEFAULT_SECTION: &str = "default";
/// Section applied after the selected environment
pub const GLOBAL_SECTION: &str = "global";

/// A settings file to load
///
/// In configuration either a bare path or `{path, required}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SettingsFileRepr")]
pub struct SettingsFile {
    pub path: PathBuf,
    /// Fail instead of skipping when the file is missing
    pub required: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SettingsFileRepr {
    Path(PathBuf),
    Full {
        path: PathBuf,
        #[serde(default)]
        required: bool,
    },
}

impl From<SettingsFileRepr> for SettingsFile {
    fn from(repr: SettingsFileRepr) -> Self {
        match repr {
            SettingsFileRepr::Path(path) => Self::new(path),
            SettingsFileRepr::Full { path, required } => Self { path, required },
        }
    }
}

impl SettingsFile {
    /// An optional file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }
}

impl From<PathBuf> for SettingsFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for SettingsFile {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// File format, picked from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }

    fn parse(self, content: &str) -> Result<serde_json::Value, String> {
        match self {
            FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Source backed by one or more structured settings files
#[derive(Debug, Clone, Default)]
pub struct FileSettingsSource {
    values: RawMap,
    loaded: Vec<PathBuf>,
    keys: KeyNormalizer,
}

impl FileSettingsSource {
    /// Load and merge `files` in order.
    ///
    /// Missing optional files are skipped. With `environment`, each file
    /// contributes its `default`, `<environment>` and `global` sections.
    pub fn load<I, F>(files: I, environment: Option<&str>) -> SettingsResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<SettingsFile>,
    {
        let mut source = Self::default();
        for file in files {
            let file = file.into();
            let Some(document) = read_document(&file)? else {
                continue;
            };
            let layer = match environment {
                Some(env) => select_sections(document, env),
                None => document,
            };
            deep_merge_maps(&mut source.values, layer);
            source.loaded.push(file.path);
        }
        tracing::debug!(
            files = source.loaded.len(),
            keys = source.values.len(),
            environment = environment.unwrap_or("-"),
            "loaded settings files"
        );
        Ok(source)
    }

    /// Only match top-level keys exactly
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.keys = self.keys.case_sensitive(case_sensitive);
        self
    }

    /// Files that were found and merged
    pub fn loaded(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn values(&self) -> &RawMap {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn find(&self, name: &str) -> Option<(&String, &RawValue)> {
        self.keys.find_in(&self.values, name)
    }
}

fn read_document(file: &SettingsFile) -> SettingsResult<Option<RawMap>> {
    let path = &file.path;
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if file.required {
                return Err(SettingsError::unavailable(
                    "files",
                    format!("{} not found", path.display()),
                ));
            }
            tracing::debug!(path = %path.display(), "settings file not found, skipping");
            return Ok(None);
        }
        Err(e) => return Err(SettingsError::Io(e)),
    };

    if content.trim().is_empty() {
        return Ok(Some(RawMap::new()));
    }

    let parse_error = |message: String| SettingsError::SettingsFileParse {
        path: path.clone(),
        message,
    };
    let format = FileFormat::from_path(path)
        .ok_or_else(|| parse_error("unsupported extension (expected yaml, yml, json or toml)".into()))?;
    let value = format.parse(&content).map_err(parse_error)?;

    match RawValue::from_json(value) {
        None => Ok(Some(RawMap::new())),
        Some(RawValue::Map(map)) => Ok(Some(map)),
        Some(other) => Err(parse_error(format!(
            "top level must be a mapping, found {}",
            other.kind_name()
        ))),
    }
}

/// Section names always match case-insensitively
fn select_sections(mut document: RawMap, environment: &str) -> RawMap {
    let sections = KeyNormalizer::new();
    let mut out = RawMap::new();
    for section in [DEFAULT_SECTION, environment, GLOBAL_SECTION] {
        let key = sections
            .find_in(&document, section)
            .map(|(key, _)| key.clone());
        if let Some(RawValue::Map(values)) = key.and_then(|k| document.remove(&k)) {
            deep_merge_maps(&mut out, values);
        }
    }
    out
}

impl SettingsSource for FileSettingsSource {
    fn name(&self) -> &str {
        "files"
    }

    fn get(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        Ok(self.find(&field.name).map(|(key, value)| {
            let complex = field.is_complex() && matches!(value, RawValue::Str(_));
            FieldLookup::new(value.clone(), key.clone()).complex(complex)
        }))
    }
}
