//! Resolution configuration
//!
//! Describes which sources take part in a resolution and how each one is
//! set up. Usually loaded from YAML:
//!
//! ```yaml
//! env_prefix: IMAD_
//! env_nested_delimiter: "__"
//! env_file: app.prod.conf
//! secrets_dir: /run/secrets
//! settings_files:
//!   - settings.yaml
//!   - path: settings.prod.toml
//!     required: true
//! environment: production
//! vault:
//!   mount: secret
//!   path: app/prod
//! sources: [env, dotenv, files, vault, secrets]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{SettingsError, SettingsResult};
use crate::registry;
use crate::resolver::PrecedenceChain;
use crate::source::SettingsSource;
use crate::sources::{
    DotenvEncoding, DotenvOptions, DotenvSource, EnvSource, FileSecretSource, FileSettingsSource,
    OverrideSource, SettingsFile,
};
use crate::vault::{VaultConfig, VaultSource};

/// Source order used when none is configured
pub const DEFAULT_SOURCES: [&str; 5] = ["env", "dotenv", "files", "vault", "secrets"];

fn default_sources() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// How to assemble the precedence chain
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Prefix required on environment, dotenv and secret file keys
    pub env_prefix: Option<String>,
    /// Delimiter encoding nesting in flat keys (e.g. `__`)
    pub env_nested_delimiter: Option<String>,
    pub case_sensitive: bool,
    /// Treat empty environment and dotenv values as unset
    pub env_ignore_empty: bool,
    pub env_file: Option<PathBuf>,
    pub env_file_encoding: DotenvEncoding,
    pub env_file_required: bool,
    pub secrets_dir: Option<PathBuf>,
    pub settings_files: Vec<SettingsFile>,
    /// Section of the settings files to apply over `default`
    pub environment: Option<String>,
    pub vault: Option<VaultConfig>,
    /// Source names in precedence order, highest first
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            env_prefix: None,
            env_nested_delimiter: None,
            case_sensitive: false,
            env_ignore_empty: false,
            env_file: None,
            env_file_encoding: DotenvEncoding::default(),
            env_file_required: false,
            secrets_dir: None,
            settings_files: Vec::new(),
            environment: None,
            vault: None,
            sources: default_sources(),
        }
    }
}

impl SettingsConfig {
    pub fn from_yaml(content: &str) -> SettingsResult<Self> {
        serde_yaml::from_str(content).map_err(|e| SettingsError::SettingsFileParse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Load from a YAML, JSON or TOML file
    pub fn from_path(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let parse_error = |message: String| SettingsError::SettingsFileParse {
            path: path.to_path_buf(),
            message,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            // YAML parses JSON as well
            _ => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Environment source with the configured key rules
    pub fn env_source(&self) -> EnvSource {
        self.apply_env_options(EnvSource::new())
    }

    fn apply_env_options(&self, mut source: EnvSource) -> EnvSource {
        if let Some(prefix) = &self.env_prefix {
            source = source.with_prefix(prefix.clone());
        }
        if let Some(delimiter) = &self.env_nested_delimiter {
            source = source.with_nested_delimiter(delimiter.clone());
        }
        source
            .case_sensitive(self.case_sensitive)
            .ignore_empty(self.env_ignore_empty)
    }

    /// Dotenv source, if an env file is configured
    pub fn dotenv_source(&self) -> SettingsResult<Option<DotenvSource>> {
        let Some(path) = &self.env_file else {
            return Ok(None);
        };
        let options = DotenvOptions::default()
            .encoding(self.env_file_encoding)
            .required(self.env_file_required);
        let mut source = DotenvSource::load(path, options)?;
        if let Some(prefix) = &self.env_prefix {
            source = source.with_prefix(prefix.clone());
        }
        if let Some(delimiter) = &self.env_nested_delimiter {
            source = source.with_nested_delimiter(delimiter.clone());
        }
        Ok(Some(
            source
                .case_sensitive(self.case_sensitive)
                .ignore_empty(self.env_ignore_empty),
        ))
    }

    /// Settings file source, if any files are listed
    pub fn files_source(&self) -> SettingsResult<Option<FileSettingsSource>> {
        if self.settings_files.is_empty() {
            return Ok(None);
        }
        let files = self.settings_files.iter().cloned();
        let source = FileSettingsSource::load(files, self.environment.as_deref())?;
        Ok(Some(source.case_sensitive(self.case_sensitive)))
    }

    /// Secret backend source, if configured
    pub fn vault_source(&self) -> SettingsResult<Option<VaultSource>> {
        match &self.vault {
            Some(vault) => {
                let source = VaultSource::connect(vault)?;
                Ok(Some(source.case_sensitive(self.case_sensitive)))
            }
            None => Ok(None),
        }
    }

    /// Secrets directory source, if configured
    pub fn secrets_source(&self) -> Option<FileSecretSource> {
        let dir = self.secrets_dir.as_ref()?;
        let mut source = FileSecretSource::open(dir);
        if let Some(prefix) = &self.env_prefix {
            source = source.with_prefix(prefix.clone());
        }
        if let Some(delimiter) = &self.env_nested_delimiter {
            source = source.with_nested_delimiter(delimiter.clone());
        }
        Some(source.case_sensitive(self.case_sensitive))
    }

    /// Create the configured sources in order.
    ///
    /// Sources that are not configured (no env file, no vault section, ...)
    /// are skipped.
    pub fn create_sources(&self) -> SettingsResult<Vec<Box<dyn SettingsSource>>> {
        let mut sources = Vec::with_capacity(self.sources.len());
        for name in &self.sources {
            match registry::create_source(name, self)? {
                Some(source) => sources.push(source),
                None => tracing::debug!(source = %name, "source not configured, skipping"),
            }
        }
        Ok(sources)
    }

    /// Overrides (when non-empty) followed by the configured sources.
    ///
    /// Every source, the overrides included, gets the configured case rules.
    pub fn build_chain(&self, overrides: OverrideSource) -> SettingsResult<PrecedenceChain> {
        let mut sources = self.create_sources()?;
        if !overrides.is_empty() {
            sources.insert(0, Box::new(overrides.case_sensitive(self.case_sensitive)));
        }
        PrecedenceChain::new(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SettingsConfig::from_yaml("{}").unwrap();
        assert_eq!(config.sources, DEFAULT_SOURCES);
        assert!(config.vault.is_none());
        assert_eq!(config.env_file_encoding, DotenvEncoding::Utf8);
    }

    #[test]
    fn test_from_yaml() {
        let config = SettingsConfig::from_yaml(
            r#"
env_prefix: IMAD_
env_nested_delimiter: "__"
env_file: app.prod.conf
env_file_encoding: latin-1
settings_files:
  - settings.yaml
environment: production
vault:
  path: app/prod
sources: [env, vault]
"#,
        )
        .unwrap();
        assert_eq!(config.env_prefix.as_deref(), Some("IMAD_"));
        assert_eq!(config.env_file_encoding, DotenvEncoding::Latin1);
        assert_eq!(config.settings_files, vec![SettingsFile::new("settings.yaml")]);
        assert_eq!(config.vault.unwrap().path, "app/prod");
        assert_eq!(config.sources, vec!["env", "vault"]);
    }

    #[test]
    fn test_unknown_source_name() {
        let config = SettingsConfig {
            sources: vec!["env".to_string(), "nope".to_string()],
            ..SettingsConfig::default()
        };
        assert!(matches!(
            config.build_chain(OverrideSource::new()),
            Err(SettingsError::UnknownSource(ref name)) if name == "nope"
        ));
    }

    #[test]
    #[serial]
    fn test_build_chain_skips_unconfigured_sources() {
        let chain = SettingsConfig::default()
            .build_chain(OverrideSource::new().set("a", "1"))
            .unwrap();
        assert_eq!(chain.names(), vec!["overrides", "env"]);
    }

    #[test]
    #[serial]
    fn test_build_chain_all_file_sources() {
        let dir = tempdir().unwrap();
        let env_file = dir.path().join("app.env");
        let settings = dir.path().join("settings.toml");
        let secrets = dir.path().join("secrets");
        fs::write(&env_file, "APP_NAME=svc\n").unwrap();
        fs::write(&settings, "port = 8080\n").unwrap();
        fs::create_dir(&secrets).unwrap();

        let config = SettingsConfig {
            env_file: Some(env_file),
            settings_files: vec![SettingsFile::new(settings)],
            secrets_dir: Some(secrets),
            ..SettingsConfig::default()
        };
        let chain = config.build_chain(OverrideSource::new()).unwrap();
        assert_eq!(chain.names(), vec!["env", "dotenv", "files", "secrets"]);
    }

    #[test]
    fn test_case_sensitive_applies_to_every_source() {
        let dir = tempdir().unwrap();
        let settings = dir.path().join("settings.yaml");
        fs::write(&settings, "APP_NAME: upper
").unwrap();

        let config = SettingsConfig {
            case_sensitive: true,
            settings_files: vec![SettingsFile::new(settings)],
            sources: vec!["files".to_string()],
            ..SettingsConfig::default()
        };
        let chain = config
            .build_chain(OverrideSource::new().set("API_KEY", "X"))
            .unwrap();
        assert_eq!(chain.names(), vec!["overrides", "files"]);

        assert!(chain.lookup_all(&Field::string("app_name")).unwrap().is_empty());
        assert!(chain.lookup_all(&Field::secret("api_key")).unwrap().is_empty());
        let found = chain.lookup_all(&Field::string("APP_NAME")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, "files");
    }

    #[test]
    fn test_from_path_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layerconf.toml");
        fs::write(&path, "env_prefix = \"APP_\"\nsources = [\"env\"]\n").unwrap();
        let config = SettingsConfig::from_path(&path).unwrap();
        assert_eq!(config.env_prefix.as_deref(), Some("APP_"));
        assert_eq!(config.sources, vec!["env"]);
    }
}
