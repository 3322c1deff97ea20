//! Surveyload - main entry point

use anyhow::Context;
use clap::Parser;
use std::process;
use surveyload::{Cli, Commands};
use surveyload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main]
async fn main() {
    // A local .env may carry the service credentials
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(LogLevel::for_verbosity(cli.verbose))
        .output(LogOutput::Console)
        .files("logs", "surveyload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging; keep the guard alive for file output
    let guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        // exit() skips destructors; flush file logs first
        drop(guard);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Export { service, export } => surveyload::commands::export::run(service, export)
            .await
            .context("Export failed"),
        Commands::Convert { archive, store } => surveyload::commands::convert::run(archive, store)
            .await
            .with_context(|| format!("Converting '{}' failed", archive.display())),
        Commands::Run {
            service,
            export,
            store,
        } => surveyload::commands::run::run(service, export, store)
            .await
            .context("Export and conversion failed"),
    }
}
