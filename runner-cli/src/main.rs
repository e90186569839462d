use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use bars_ingest_core::config::load_config;
use bars_ingest_core::telemetry::init_tracing;
use bars_ingest_core::{Ingestor, SqlSink};

/// Loads daily bar csv files into the configured database tables.
#[derive(Debug, Parser)]
#[command(name = "bars-loader", version)]
struct Cli {
    /// YAML configuration file. Falls back to `INGEST_CONFIG`, then defaults.
    #[arg(long, env = "INGEST_CONFIG_PATH")]
    config: Option<PathBuf>,
}

/// Entry point for a one-shot load.
///
/// What it does at a high-level:
///     Load config.
///     Connect to the database and ensure the error log exists.
///     For each configured load, in order:
///         - stream the csv file through the validator
///         - write valid rows to the load's table, rejects to the error log
///
/// The first fatal error stops the process; loads already finished stay committed.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let sink = SqlSink::connect(&config.database)
        .await
        .context("Failed to open database")?;
    let mut ingestor = Ingestor::new(sink, config.processing.clone());

    for load in &config.loads {
        match ingestor.run_load(load).await {
            Ok(metrics) => {
                info!(
                    load = %load.name,
                    metrics = %serde_json::to_string(&metrics)?,
                    "Load complete"
                );
            }
            Err(e) => {
                error!(load = %load.name, stage = e.stage(), error = %e, "Load failed");
                return Err(e).with_context(|| format!("Load {} failed", load.name));
            }
        }
    }

    Ok(())
}
