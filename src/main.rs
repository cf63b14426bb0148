//! Main entry point for the kline-crawler CLI

use clap::Parser;
use kline_crawler::cli::{Cli, CliError, Commands};
use kline_crawler::metrics;
use kline_crawler::shutdown::{self, ShutdownCoordinator};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting.
///
/// Logs go to stderr; stdout carries command output (`urls`, run summary).
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kline_crawler=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;

    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)
            .await
            .map_err(|e| CliError::Metrics(e.to_string()))?;
    }

    match &cli.command {
        Commands::Run(args) => {
            // First Ctrl+C stops new units; a second one exits immediately
            let shutdown = ShutdownCoordinator::shared();
            shutdown::set_global_shutdown(shutdown.clone());
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    while tokio::signal::ctrl_c().await.is_ok() {
                        if shutdown.request_shutdown() {
                            warn!("Ctrl+C received - finishing in-flight units, press again to abort");
                        } else {
                            warn!("Second Ctrl+C received - aborting");
                            std::process::exit(130);
                        }
                    }
                }
            });

            args.execute(config, shutdown).await?;
        }
        Commands::Urls(args) => args.execute(config)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
