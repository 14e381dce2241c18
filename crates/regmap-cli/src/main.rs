//! regmap - Resolve registry hosts configuration into endpoint lists
//!
//! Reads `hosts.toml` files laid out per registry host and prints the
//! endpoints a registry client would contact, in order.

mod config;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, OutputFormat};
use regmap_core::{resolve_registry_hosts, HostsDocument};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "regmap")]
#[command(about = "Resolve registry hosts.toml configuration into endpoint lists")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "regmap.toml")]
    config: PathBuf,

    /// Root directory of per-registry host configuration
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the endpoints to contact for a registry host
    Resolve {
        /// Registry host, e.g. docker.io or registry.local:5000
        host: String,
    },
    /// Parse a single hosts.toml file
    Parse {
        /// Path to the hosts file
        file: PathBuf,
        /// Registry host the file belongs to
        #[arg(long, default_value = "")]
        host: String,
    },
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    // Logs go to stderr so stdout stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("regmap v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::InitConfig { force } => config::save_default_config(&args.config, force),
        Command::Resolve { host } => {
            let config = effective_config(&args.config, args.config_path, args.format)?;
            let endpoints = resolve_registry_hosts(&config.hosts.config_path, &host)
                .with_context(|| format!("Failed to resolve hosts for {}", host))?;
            match config.output.format {
                OutputFormat::Text => print!("{}", render::endpoints(&endpoints)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&endpoints)?),
            }
            Ok(())
        }
        Command::Parse { file, host } => {
            let config = effective_config(&args.config, args.config_path, args.format)?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = HostsDocument::parse(&host, &bytes)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            match config.output.format {
                OutputFormat::Text => print!("{}", render::document(&doc)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
            }
            Ok(())
        }
    }
}

/// Load the configuration file and apply command-line overrides
fn effective_config(
    path: &Path,
    config_path: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<Config> {
    let mut config = config::load_config(path)?;

    if let Some(config_path) = config_path {
        config.hosts.config_path = config_path;
    }
    if let Some(format) = format {
        config.output.format = format;
    }

    info!(
        config_path = %config.hosts.config_path.display(),
        format = ?config.output.format,
        "Configuration loaded"
    );
    Ok(config)
}
