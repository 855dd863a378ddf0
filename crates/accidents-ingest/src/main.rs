//! Accidents Ingest - one-shot loader

use accidents_common::logging::{init_logging, LogConfig, LogLevel};
use accidents_ingest::{
    config::{create_pool, DatabaseConfig, IngestConfig},
    PgStore, Pipeline,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "accidents-ingest")]
#[command(author, version, about = "Load road-accident CSV files into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop the destination tables and load every CSV file under the root
    Run {
        /// Ingestion root (overrides CSV_DATA_DIR)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Rows per insert statement (overrides INGEST_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Only check the ingestion root layout
    Check {
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("accidents-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let mut ingest_config = IngestConfig::from_env()?;

    match cli.command {
        Command::Run { root, chunk_size } => {
            if let Some(root) = root {
                ingest_config.csv_root = root;
            }
            if let Some(size) = chunk_size {
                ingest_config.chunk_size = size;
            }
            ingest_config.validate()?;

            let db_config = DatabaseConfig::from_env()?;
            let pool = create_pool(&db_config)
                .await
                .context("Failed to connect to database")?;
            let store = PgStore::new(pool, db_config.name.clone()).await?;

            info!(root = %ingest_config.csv_root.display(), "Starting ingestion");
            let pipeline = Pipeline::new(ingest_config, Arc::new(store));
            let report = pipeline.run().await?;

            info!(
                files = report.files_loaded,
                rows_inserted = report.rows_inserted,
                rows_skipped = report.rows_skipped,
                "Ingestion complete"
            );
        },
        Command::Check { root } => {
            let root = root.unwrap_or(ingest_config.csv_root);
            let layout = accidents_ingest::layout::validate_layout(&root).await?;
            info!(root = %layout.root().display(), "Ingestion root is valid");
        },
    }

    Ok(())
}
