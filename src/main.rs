//! hurlui - run Hurl scripts and keep their results
//!
//! Thin CLI over the library: every subcommand maps onto one orchestrator
//! operation and prints its result.

use std::path::PathBuf;

use clap::Parser;
use hurlui::cli;
use hurlui::commands::Commands;
use hurlui::common::config::Config;
use hurlui::common::logging;
use hurlui::Orchestrator;

#[derive(Parser)]
#[command(name = "hurlui", about = "Run Hurl scripts and browse their last results")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Configuration file to use instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(log_file) = logging::init_cli(cli.verbose) {
        tracing::debug!("Logging to {}", log_file.display());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            cli::print_error(&e);
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::from_config(&config);
    let result = cli::dispatch(cli.command, &orchestrator).await;
    orchestrator.shutdown();

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            cli::print_error(&e);
            std::process::exit(1);
        }
    }
}
