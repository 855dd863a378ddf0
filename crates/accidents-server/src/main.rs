//! Accidents Server - Main entry point

use accidents_common::logging::{init_logging, LogConfig};
use accidents_ingest::{config::create_pool, PgStore, Pipeline};
use accidents_server::{config::Config, create_router};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("accidents-server")
        .filter_directives("accidents_server=debug,accidents_ingest=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Accidents Server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        csv_root = %config.ingest.csv_root.display(),
        "Configuration loaded"
    );

    let db_pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(db_pool.clone(), config.database.name.clone()).await?;
    let pipeline = Arc::new(Pipeline::new(config.ingest.clone(), Arc::new(store)));

    let app = create_router(pipeline.clone(), db_pool, &config.cors);

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    // Give an in-flight run the shutdown window to reach a chunk boundary
    if pipeline.cancel() {
        let limit = Duration::from_secs(config.server.shutdown_timeout_secs);
        if pipeline.wait_idle(limit).await {
            info!("In-flight ingestion run cancelled");
        } else {
            warn!("Ingestion run still active after {}s, exiting", limit.as_secs());
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
