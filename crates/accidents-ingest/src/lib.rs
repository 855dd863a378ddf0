//! Accidents Ingest Library
//!
//! Loads the road-accident open-data CSV files into PostgreSQL, replacing
//! whatever the previous run loaded.
//!
//! # Pipeline
//!
//! - **layout**: checks the ingestion root before anything destructive happens
//! - **schema**: drops and recreates the destination tables
//! - **parser**: normalizes separators and quoting into a [`models::RawTable`]
//! - **batcher**: splits rows into bounded chunks
//! - **loader**: maps a chunk to one multi-row `INSERT` and executes it
//! - **pipeline**: sequences the above and tracks [`state::RunStatus`]
//!
//! # Example
//!
//! ```no_run
//! use accidents_ingest::{config::IngestConfig, Pipeline, PgStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgresql://localhost/accidents").await?;
//!     let store = PgStore::new(pool, None).await?;
//!     let pipeline = Pipeline::new(IngestConfig::default(), Arc::new(store));
//!     let report = pipeline.run().await?;
//!     println!("{} rows inserted", report.rows_inserted);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod batcher;
pub mod config;
pub mod error;
pub mod layout;
pub mod loader;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{IngestError, IngestResult};
pub use models::{RawTable, RecordType};
pub use pipeline::{Pipeline, RunReport, StartOutcome};
pub use state::{RunSnapshot, RunStatus};
pub use store::{IngestStore, PgStore};
