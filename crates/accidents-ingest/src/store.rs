//! Database seam for the pipeline
//!
//! The orchestrator only needs two things from the database: reset the
//! schema and execute an insert. [`PgStore`] does both against PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{IngestError, IngestResult};
use crate::loader::InsertStatement;
use crate::schema::SchemaManager;

/// Destination of an ingestion run
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Drop and recreate the destination tables
    async fn reset_schema(&self) -> IngestResult<()>;

    /// Execute one insert, returning the number of rows written
    async fn insert(&self, statement: &InsertStatement) -> IngestResult<u64>;
}

/// PostgreSQL-backed store
pub struct PgStore {
    db: PgPool,
    schema: SchemaManager,
}

impl PgStore {
    /// `database` scopes the schema catalog lookups; `None` asks the server.
    pub async fn new(db: PgPool, database: Option<String>) -> IngestResult<Self> {
        let schema = match database {
            Some(name) => SchemaManager::new(db.clone(), name),
            None => SchemaManager::for_current_database(db.clone()).await?,
        };

        Ok(Self { db, schema })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl IngestStore for PgStore {
    async fn reset_schema(&self) -> IngestResult<()> {
        self.schema.reset().await
    }

    async fn insert(&self, statement: &InsertStatement) -> IngestResult<u64> {
        let mut query = sqlx::query(statement.sql());
        for param in statement.params() {
            query = query.bind(param.as_deref());
        }

        let result = query
            .execute(&self.db)
            .await
            .map_err(|source| IngestError::Insert {
                table: statement.table().name,
                statement: statement.sql().to_string(),
                params: statement.param_count(),
                source,
            })?;

        Ok(result.rows_affected())
    }
}
