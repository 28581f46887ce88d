//! layerconf Core
//!
//! Layered settings resolution. A typed settings object is assembled from
//! an ordered chain of sources (highest priority first):
//! explicit overrides, environment variables, dotenv files, structured
//! settings files, a Vault KV secret and a secrets directory.
//!
//! ## Resolution
//!
//! - Every source is queried for every declared field.
//! - The first source with a value wins; object fields merge per leaf.
//! - Flat keys such as `DB__HOST` are decoded into nested mappings.
//! - A secret backend that cannot be reached is skipped with a warning.
//! - The merged mapping is coerced and validated against the schema, and
//!   all problems are reported together.
//!
//! ```
//! use layerconf_core::{EnvSource, Field, OverrideSource, Schema, SettingsBuilder};
//!
//! let schema = Schema::new()
//!     .field(Field::secret("api_key"))
//!     .field(Field::string("app_name"))
//!     .field(Field::object("db", Schema::new().field(Field::string("host"))));
//!
//! let settings = SettingsBuilder::new(schema)
//!     .overrides(OverrideSource::new().set("api_key", "X"))
//!     .source(
//!         EnvSource::from_vars([("API_KEY", "Y"), ("APP_NAME", "svc"), ("DB__HOST", "db.local")])
//!             .with_nested_delimiter("__"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(settings.get_str("app_name"), Some("svc"));
//! assert_eq!(settings.get_str("db.host"), Some("db.local"));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod keys;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod settings;
pub mod source;
pub mod sources;
pub mod value;
pub mod vault;

// Re-export commonly used types
pub use config::{SettingsConfig, DEFAULT_SOURCES};
pub use decode::{DecodeError, NestedKeyDecoder};
pub use error::{SettingsError, SettingsResult};
pub use keys::KeyNormalizer;
pub use registry::{create_source, list_sources, register_source, SourceDefinition, SourceFactory};
pub use resolver::{MergedMapping, PrecedenceChain, PrecedenceResolver, Provenance};
pub use schema::{Field, FieldKind, Schema, SchemaError};
pub use settings::{
    resolve, FieldError, FieldProblem, ResolvedSettings, SettingValue, SettingsBuilder,
    ValidationErrors,
};
pub use source::SettingsSource;
pub use sources::{
    DotenvEncoding, DotenvOptions, DotenvSource, EnvSource, FileSecretSource, FileSettingsSource,
    OverrideSource, SettingsFile,
};
pub use value::{FieldLookup, RawMap, RawValue};
pub use vault::{BackendError, MemoryBackend, SecretBackend, VaultConfig, VaultKvClient, VaultSource};
