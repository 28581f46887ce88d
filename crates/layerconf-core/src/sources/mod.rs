//! Built-in settings sources

mod dotenv;
mod env;
mod file;
mod file_secrets;
mod flat;
mod overrides;

pub use dotenv::{DotenvEncoding, DotenvOptions, DotenvSource};
pub use env::EnvSource;
pub use file::{FileFormat, FileSettingsSource, SettingsFile, DEFAULT_SECTION, GLOBAL_SECTION};
pub use file_secrets::FileSecretSource;
pub use overrides::OverrideSource;
