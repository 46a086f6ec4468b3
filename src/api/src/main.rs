//! Keiba-Scan
//!
//! Finds JRA race cards on netkeiba.com by walking the race id space and
//! recovering horse entries from the race tables.

mod aggregator;
mod cli;
mod config;
mod error;
mod output;
mod scraper;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_scan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => cli::run_scan(args).await,
        Commands::Inspect(args) => cli::run_inspect(args),
    }
}
