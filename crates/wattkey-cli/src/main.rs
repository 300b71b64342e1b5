//! wattkey - card-gated energy session controller, simulated hardware front end

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wattkey_session::WattkeyConfig;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;

    match cli.command {
        Commands::Simulate { card, seconds } => commands::simulate(config, &card, seconds).await,
        Commands::CheckCard { uid } => commands::check_card(&config, &uid),
    }
}

/// Setup logging based on verbosity level; `RUST_LOG` overrides both.
fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<WattkeyConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(WattkeyConfig::load(path)?)
        }
        None => Ok(WattkeyConfig::default()),
    }
}
