//! CLI shell for the logwarden detection engine.
//!
//! Plays the thin collaborator roles around the core: loads already
//! normalized records from JSON, runs detection, prints the summary, and
//! optionally persists the JSON run report.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use logwarden_core::config::EngineConfig;

/// logwarden -- exploit detection over normalized security event streams.
#[derive(Parser, Debug)]
#[command(name = "logwarden", version, about)]
struct Cli {
    /// Path to a TOML config file with engine defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exploit detection over a JSON file of normalized records.
    Detect {
        /// Input JSON file: an array of {timestamp, host, message, src_ip?, template?}.
        input: PathBuf,

        /// Minimum confidence (0-100) to report. Falls back to the
        /// DETECTION_THRESHOLD environment variable, then the config default.
        #[arg(short, long)]
        threshold: Option<i64>,

        /// Write the full JSON run report to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the actor sessions found in a JSON file of normalized records.
    Sessions {
        /// Input JSON file of normalized records.
        input: PathBuf,

        /// Inactivity timeout in seconds that closes a session.
        #[arg(long)]
        timeout: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    // All logging goes to stderr so stdout stays clean for report output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect {
            input,
            threshold,
            output,
        } => commands::detect::run(&input, threshold, output.as_deref(), &config),
        Commands::Sessions { input, timeout } => {
            commands::sessions::run(&input, timeout.unwrap_or(config.session_timeout_secs))
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}
