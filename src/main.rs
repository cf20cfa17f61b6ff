mod activity_log;
mod backup;
mod channel;
mod cli;
mod config;
mod games;
mod job;
mod restore;
mod retention;
mod schedule;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let default_filter = if cli.output.verbose {
        "sims_backup=debug,info"
    } else {
        "sims_backup=info,warn"
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting Sims Backup Utility v{}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
