//! Ingestion routes
//!
//! The trigger replies as soon as the run is accepted; completion and late
//! failures are observed through `GET /status`.

use accidents_ingest::{Pipeline, RunSnapshot, StartOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;

pub const PROCESS_STARTED: &str = "PROCESS STARTED";
pub const PROCESS_ALREADY_RUNNING: &str = "PROCESS ALREADY RUNNING";
pub const PROCESS_CANCELLING: &str = "PROCESS CANCELLING";
pub const PROCESS_NOT_RUNNING: &str = "PROCESS NOT RUNNING";

/// Create ingestion routes
pub fn ingest_routes() -> Router<Arc<Pipeline>> {
    Router::new()
        .route("/init-csv-data", get(init_csv_data))
        .route("/status", get(status))
        .route("/cancel", post(cancel))
}

/// Create the database health route
pub fn health_routes() -> Router<PgPool> {
    Router::new().route("/health", get(health_check))
}

/// Start an ingestion run
///
/// GET /init-csv-data
async fn init_csv_data(State(pipeline): State<Arc<Pipeline>>) -> Json<Value> {
    match pipeline.start().await {
        StartOutcome::Started => {
            info!("Ingestion run accepted");
            Json(json!({ "data": PROCESS_STARTED }))
        },
        StartOutcome::AlreadyRunning => Json(json!({ "data": PROCESS_ALREADY_RUNNING })),
        StartOutcome::Failed(e) => {
            warn!(error = %e, "Ingestion run rejected");
            Json(json!({ "err": e.to_string() }))
        },
    }
}

/// Current run state and every error recorded so far
///
/// GET /status
async fn status(State(pipeline): State<Arc<Pipeline>>) -> Json<RunSnapshot> {
    Json(pipeline.snapshot())
}

/// POST /cancel
async fn cancel(State(pipeline): State<Arc<Pipeline>>) -> Json<Value> {
    let data = if pipeline.cancel() {
        PROCESS_CANCELLING
    } else {
        PROCESS_NOT_RUNNING
    };
    Json(json!({ "data": data }))
}

/// GET /health
async fn health_check(State(db): State<PgPool>) -> Result<Response, AppError> {
    sqlx::query("SELECT 1").execute(&db).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": "connected"
        })),
    )
        .into_response())
}
