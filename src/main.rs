#![deny(clippy::mod_module_files)]
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recent_pins::{config::ShelfConfig, persistence::FilePreferences};
use tracing_subscriber::EnvFilter;

mod commands;

/// Inspect and maintain the persisted recent and pinned lists
#[derive(Debug, Parser)]
#[command(name = "recent-pins", version)]
struct Cli {
    /// Preferences file (defaults to the configured prefs_path)
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Surface whose namespace to operate on
    #[arg(long, default_value = "AssetHistory")]
    surface: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every recorded scope with its list sizes
    Scopes,
    /// Print the pinned and history ids of one scope
    Show { scope: String },
    /// Forget one scope
    Forget { scope: String },
    /// Forget every scope of the surface
    Clear,
    /// Print the whole index
    Dump {
        /// JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// Decode a durable id
    Parse { id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Command::Parse { id } = &cli.command {
        return commands::parse(id);
    }

    let config = ShelfConfig::load()?;
    let prefs_path = cli.prefs.unwrap_or_else(|| config.prefs_path.clone());
    let prefs = FilePreferences::open(&prefs_path)?;
    let namespace = config.namespace(&cli.surface);

    match cli.command {
        Command::Scopes => commands::scopes(&prefs, namespace),
        Command::Show { scope } => commands::show(&prefs, namespace, &scope),
        Command::Forget { scope } => commands::forget(&prefs, namespace, &scope),
        Command::Clear => commands::clear(&prefs, namespace),
        Command::Dump { json } => commands::dump(&prefs, namespace, json),
        Command::Parse { .. } => Ok(()),
    }
}
