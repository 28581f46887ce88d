//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "layerconf")]
#[command(about = "Resolve layered settings from overrides, env, dotenv, secret backends and files", long_about = None)]
#[command(version)]
#[command(
    after_help = "Examples:\n  layerconf resolve --schema schema.yaml --env-prefix APP_ --nested-delimiter __\n  layerconf resolve --schema schema.yaml --config layerconf.yaml --set db.host=localhost --show-sources\n  layerconf decode --delimiter __ DB__HOST=localhost DB__PORT=5432\n  layerconf sources\n"
)]
pub struct Cli {
    /// Log filter (e.g. `info`, `layerconf_core=debug`). Logs go to stderr.
    #[arg(long, global = true, env = "LAYERCONF_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a schema against the configured sources and print the result
    Resolve(ResolveArgs),

    /// Decode flat KEY=VALUE pairs into a nested mapping
    Decode {
        /// Delimiter separating nesting levels
        #[arg(long, default_value = "__")]
        delimiter: String,

        /// Prefix stripped from every key; keys without it are ignored
        #[arg(long)]
        prefix: Option<String>,

        /// Keep key case instead of lowercasing
        #[arg(long)]
        case_sensitive: bool,

        #[arg(value_name = "KEY=VALUE", value_parser = parse_pair, required = true)]
        pairs: Vec<(String, String)>,
    },

    /// List the registered source names
    Sources,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Schema file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Resolution config file (YAML, JSON or TOML)
    #[arg(long, value_name = "FILE", env = "LAYERCONF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Explicit override; dotted keys set nested values (db.host=localhost)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub overrides: Vec<(String, String)>,

    #[arg(long)]
    pub env_prefix: Option<String>,

    #[arg(long)]
    pub nested_delimiter: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub secrets_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Also print which source supplied each value
    #[arg(long)]
    pub show_sources: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Parse `KEY=VALUE`; the value may itself contain `=`
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in '{}'", s)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("db.url=postgres://u:p@h/db?x=1").unwrap(),
            ("db.url".to_string(), "postgres://u:p@h/db?x=1".to_string())
        );
        assert_eq!(parse_pair("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=value").is_err());
    }

    #[test]
    fn test_resolve_args() {
        let cli = Cli::try_parse_from([
            "layerconf",
            "resolve",
            "--schema",
            "schema.yaml",
            "--set",
            "api_key=X",
            "--set",
            "db.host=localhost",
            "--nested-delimiter",
            "__",
            "--format",
            "yaml",
            "--show-sources",
        ])
        .unwrap();

        let Commands::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.schema, PathBuf::from("schema.yaml"));
        assert_eq!(args.overrides.len(), 2);
        assert_eq!(args.overrides[1], ("db.host".to_string(), "localhost".to_string()));
        assert_eq!(args.nested_delimiter.as_deref(), Some("__"));
        assert_eq!(args.format, OutputFormat::Yaml);
        assert!(args.show_sources);
    }

    #[test]
    fn test_resolve_requires_schema() {
        assert!(Cli::try_parse_from(["layerconf", "resolve"]).is_err());
    }

    #[test]
    fn test_decode_args() {
        let cli = Cli::try_parse_from([
            "layerconf",
            "decode",
            "--prefix",
            "APP_",
            "APP_DB__HOST=localhost",
        ])
        .unwrap();

        match cli.command {
            Commands::Decode {
                delimiter,
                prefix,
                case_sensitive,
                pairs,
            } => {
                assert_eq!(delimiter, "__");
                assert_eq!(prefix.as_deref(), Some("APP_"));
                assert!(!case_sensitive);
                assert_eq!(pairs, vec![("APP_DB__HOST".to_string(), "localhost".to_string())]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_requires_pairs() {
        assert!(Cli::try_parse_from(["layerconf", "decode"]).is_err());
    }
}
