//! bgdelay CLI - rule payload tooling
//!
//! Features:
//! - Payload validation and normalization
//! - Rule resolution for a page
//! - Page-load simulation against an in-memory page

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// bgdelay CLI - background video delay toolkit
#[derive(Parser)]
#[command(name = "bgdelay")]
#[command(version)]
#[command(about = "Check and simulate background video delay rules", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a rule payload and print the normalized rules
    Check {
        /// Path to the JSON payload
        payload: PathBuf,
    },

    /// Show which rule applies to a page
    Resolve {
        /// Path to the JSON payload
        payload: PathBuf,

        /// Page id (0 = no page context)
        #[arg(short, long, default_value = "0")]
        page: u64,

        /// Engine config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Simulate a page load and print the state timeline
    Simulate {
        /// Path to the JSON payload
        payload: PathBuf,

        /// Page id (0 = no page context)
        #[arg(short, long, default_value = "0")]
        page: u64,

        /// Engine config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Remove the target element before activation
        #[arg(long)]
        missing_target: bool,

        /// Never report player start
        #[arg(long)]
        no_start: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { payload } => {
            commands::check(&payload, &cli.format)?;
        }
        Commands::Resolve { payload, page, config } => {
            commands::resolve(&payload, page, config.as_deref(), &cli.format)?;
        }
        Commands::Simulate { payload, page, config, missing_target, no_start } => {
            let options = commands::SimulateOptions { missing_target, no_start };
            commands::simulate(&payload, page, config.as_deref(), options, &cli.format).await?;
        }
    }

    Ok(())
}
