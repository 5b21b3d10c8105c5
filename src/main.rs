//! Metric provider helper
//!
//! Entry point for the command line binary.

use anyhow::{Context, Result};
use clap::Parser;
use metricprovider_helper::cli::{self, Cli, CommandStatus};
use metricprovider_helper::config::Config;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr, command output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load_default(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_process_env();
    config.validate()?;

    match cli::run(cli, &config).await? {
        CommandStatus::Completed => Ok(ExitCode::SUCCESS),
        CommandStatus::InvalidCommand(kind) => {
            eprintln!("Invalid command {}", kind);
            Ok(ExitCode::from(2))
        }
    }
}
