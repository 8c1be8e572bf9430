//! Pulsewatch CLI
//!
//! Command-line host for the pulsewatch engine. Runs a simulated wearable
//! against an in-memory store with logging channels, and validates engine
//! configuration files.
//!
//! # Usage
//!
//! ```bash
//! # Simulate 200 readings, one every 100ms, publishing alerts to a topic
//! pulsewatch simulate --email ada@example.com --topic health-alerts --readings 200
//!
//! # Validate a configuration file
//! pulsewatch check-config pulsewatch.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use pulsewatch::EngineConfig;

pub mod simulate;

/// Pulsewatch Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "pulsewatch")]
#[command(author, version, about = "Heart-rate trend detection and emergency escalation")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated wearable through a monitoring session
    Simulate(simulate::SimulateArgs),

    /// Validate an engine configuration file
    CheckConfig(CheckConfigArgs),

    /// Display version information
    Version,
}

/// Arguments for the check-config command
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to a JSON configuration file
    pub path: PathBuf,
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable lines and tables
    #[default]
    Table,
    /// One JSON object per line
    Json,
}

/// Load a configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Execute the check-config command
pub fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = load_config(Some(&args.path))?;
    println!(
        "{} {} is valid",
        "[OK]".green().bold(),
        args.path.display()
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
