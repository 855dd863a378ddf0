//! Accidents Server Library
//!
//! HTTP surface for the road-accident CSV loader: trigger a run, poll its
//! status, request cancellation, and check database health.
//!
//! | Route | Reply |
//! |-------|-------|
//! | `GET /init-csv-data` | `{"data": "PROCESS STARTED"}`, `{"data": "PROCESS ALREADY RUNNING"}` or `{"err": "..."}` |
//! | `GET /status` | run snapshot |
//! | `POST /cancel` | `{"data": "PROCESS CANCELLING"}` or `{"data": "PROCESS NOT RUNNING"}` |
//! | `GET /health` | database ping |

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

pub use error::AppError;

use accidents_ingest::Pipeline;
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::config::CorsConfig;

/// Create the application router with all routes and middleware
pub fn create_router(pipeline: Arc<Pipeline>, db: PgPool, cors: &CorsConfig) -> Router {
    Router::new()
        .merge(routes::ingest_routes().with_state(pipeline))
        .merge(routes::health_routes().with_state(db))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}
