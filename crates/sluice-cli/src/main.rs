//! Sluice CLI - drive the governance engine from the command line.
//!
//! Every command runs against a fresh in-memory world.

pub mod commands;
pub mod config;
pub mod output;
pub mod telemetry;

use clap::Parser;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    let config = match &cli.config {
        Some(path) => config::SluiceConfig::from_file(path)?,
        None => config::SluiceConfig::default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    telemetry::init_telemetry(level, cli.json_logs || config.logging.is_json())?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    if let Err(e) = commands::execute(cli.command, &config) {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
