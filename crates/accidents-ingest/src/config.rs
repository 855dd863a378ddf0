//! Ingestion and database configuration
//!
//! Loaded from the environment (after `.env`), every value with a default.

use accidents_common::error::env_or;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::PathBuf;
use std::time::Duration;

use crate::batcher::DEFAULT_CHUNK_SIZE;
use crate::loader::MAX_BIND_PARAMS;
use crate::models::TABLES;

/// Default ingestion root.
pub const DEFAULT_CSV_DATA_DIR: &str = "./csv-data";

/// Default per-statement timeout in seconds.
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 300;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/accidents";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Directory holding the four record-type subdirectories
    pub csv_root: PathBuf,
    /// Rows per insert statement
    pub chunk_size: usize,
    pub statement_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_root: PathBuf::from(DEFAULT_CSV_DATA_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            statement_timeout_secs: DEFAULT_STATEMENT_TIMEOUT_SECS,
        }
    }
}

impl IngestConfig {
    /// `CSV_DATA_DIR`, `INGEST_CHUNK_SIZE`, `INGEST_STATEMENT_TIMEOUT`
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            csv_root: std::env::var("CSV_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CSV_DATA_DIR)),
            chunk_size: env_or("INGEST_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            statement_timeout_secs: env_or(
                "INGEST_STATEMENT_TIMEOUT",
                DEFAULT_STATEMENT_TIMEOUT_SECS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("Ingest chunk size must be greater than 0");
        }
        let max = max_chunk_size();
        if self.chunk_size > max {
            anyhow::bail!(
                "Ingest chunk size ({}) exceeds {} rows for the widest table",
                self.chunk_size,
                max
            );
        }
        if self.statement_timeout_secs == 0 {
            anyhow::bail!("Ingest statement timeout must be greater than 0");
        }
        Ok(())
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

/// Largest chunk whose insert stays within the bind parameter limit
pub fn max_chunk_size() -> usize {
    let widest = TABLES.iter().map(|t| t.columns.len()).max().unwrap_or(1);
    MAX_BIND_PARAMS / widest.max(1)
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Catalog name used by the schema reset; `None` asks the server
    pub name: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            name: None,
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// `DATABASE_URL`, `DATABASE_NAME`, `DATABASE_MAX_CONNECTIONS`,
    /// `DATABASE_MIN_CONNECTIONS`, `DATABASE_CONNECT_TIMEOUT`, `DATABASE_IDLE_TIMEOUT`
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            name: std::env::var("DATABASE_NAME").ok().filter(|s| !s.is_empty()),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS)?,
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS)?,
            connect_timeout_secs: env_or(
                "DATABASE_CONNECT_TIMEOUT",
                DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.min_connections > self.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections,
                self.max_connections
            );
        }

        Ok(())
    }
}

/// Open the connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ingest_config() {
        let config = IngestConfig::default();
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.csv_root, PathBuf::from("./csv-data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = IngestConfig {
            chunk_size: 0,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        assert_eq!(max_chunk_size(), 1927);

        let config = IngestConfig {
            chunk_size: 2000,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());

        let config = IngestConfig {
            chunk_size: max_chunk_size(),
            ..IngestConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_validated() {
        let config = DatabaseConfig {
            min_connections: 20,
            max_connections: 5,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(DatabaseConfig::default().validate().is_ok());
    }
}
