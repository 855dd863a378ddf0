//! Accidents Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the accidents loader workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`AccidentsError`] and the [`Result`] alias
//! - **Logging**: environment-driven `tracing` setup shared by the server and the CLI
//!
//! # Example
//!
//! ```no_run
//! use accidents_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{AccidentsError, Result};
