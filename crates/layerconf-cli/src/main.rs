//! layerconf CLI
//!
//! Thin front-end over `layerconf-core`: resolves a schema against the
//! configured sources, decodes flat keys, and lists the source registry.
//! Results go to stdout, logs and errors to stderr.

mod args;

use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use layerconf_core::{
    list_sources, resolve, KeyNormalizer, NestedKeyDecoder, OverrideSource, Schema,
    SettingsConfig,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands, OutputFormat, ResolveArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve(args) => run_resolve(args),
        Commands::Decode {
            delimiter,
            prefix,
            case_sensitive,
            pairs,
        } => {
            let decoded = decode_pairs(&delimiter, prefix.as_deref(), case_sensitive, pairs)?;
            println!("{}", render(&decoded, OutputFormat::Json)?);
            Ok(())
        }
        Commands::Sources => {
            for (name, description, builtin) in list_sources() {
                let kind = if builtin { "builtin" } else { "custom" };
                println!("{:<10} {:<8} {}", name, kind, description);
            }
            Ok(())
        }
    }
}

fn run_resolve(args: ResolveArgs) -> Result<()> {
    let schema = Schema::from_path(&args.schema)
        .with_context(|| format!("failed to load schema {}", args.schema.display()))?;
    let config = build_config(&args)?;

    let overrides = args
        .overrides
        .iter()
        .fold(OverrideSource::new(), |overrides, (key, value)| {
            overrides.set_path(key, value.as_str())
        });

    let chain = config.build_chain(overrides)?;
    tracing::info!(sources = ?chain.names(), "resolving {}", args.schema.display());
    let settings = resolve(&schema, &chain)?;

    let output = if args.show_sources {
        let sources: BTreeMap<&str, String> = settings
            .provenance()
            .iter()
            .map(|(path, origin)| (path.as_str(), origin.to_string()))
            .collect();
        json!({ "settings": settings.to_json(), "sources": sources })
    } else {
        settings.to_json()
    };
    println!("{}", render(&output, args.format)?);
    Ok(())
}

/// Config file (if any) with the command line flags applied on top
fn build_config(args: &ResolveArgs) -> Result<SettingsConfig> {
    let mut config = match &args.config {
        Some(path) => SettingsConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SettingsConfig::default(),
    };
    if let Some(prefix) = &args.env_prefix {
        config.env_prefix = Some(prefix.clone());
    }
    if let Some(delimiter) = &args.nested_delimiter {
        config.env_nested_delimiter = Some(delimiter.clone());
    }
    if let Some(env_file) = &args.env_file {
        config.env_file = Some(env_file.clone());
    }
    if let Some(dir) = &args.secrets_dir {
        config.secrets_dir = Some(dir.clone());
    }
    Ok(config)
}

fn decode_pairs(
    delimiter: &str,
    prefix: Option<&str>,
    case_sensitive: bool,
    pairs: Vec<(String, String)>,
) -> Result<Value> {
    let mut keys = KeyNormalizer::new().case_sensitive(case_sensitive);
    if let Some(prefix) = prefix {
        keys = keys.with_prefix(prefix);
    }
    let entries: Vec<(String, String)> = pairs
        .into_iter()
        .filter_map(|(key, value)| keys.normalize(&key).map(|key| (key, value)))
        .collect();
    let decoded = NestedKeyDecoder::new(delimiter).decode(entries)?;
    Ok(serde_json::to_value(decoded)?)
}

fn render(value: &Value, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
