//! Destination schema reset
//!
//! Drops and recreates `events`, `vehicles` and `users`. There is no
//! surrounding transaction: a failure part-way leaves a partial schema, and
//! the next run simply starts over.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{IngestError, IngestResult};
use crate::models::{Table, TABLES};

const TABLE_EXISTS_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_type = 'BASE TABLE'
      AND table_schema = 'public'
      AND table_catalog::text = $1
      AND table_name::text = $2
"#;

/// Drops and recreates the destination tables
pub struct SchemaManager {
    db: PgPool,
    database: String,
}

impl SchemaManager {
    /// `database` scopes the catalog lookup (`table_catalog`)
    pub fn new(db: PgPool, database: impl Into<String>) -> Self {
        Self {
            db,
            database: database.into(),
        }
    }

    /// Use the database the pool is connected to
    pub async fn for_current_database(db: PgPool) -> IngestResult<Self> {
        let database: String = sqlx::query_scalar("SELECT current_database()::text")
            .fetch_one(&db)
            .await
            .map_err(|source| IngestError::Schema {
                table: "information_schema.tables",
                source,
            })?;

        Ok(Self::new(db, database))
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Drop every existing destination table, then create all of them.
    ///
    /// Safe to call repeatedly.
    pub async fn reset(&self) -> IngestResult<()> {
        for table in &TABLES {
            if self.exists(table).await? {
                self.drop_table(table).await?;
            }
        }

        for table in &TABLES {
            self.create_table(table).await?;
        }

        info!(database = %self.database, tables = TABLES.len(), "Destination tables recreated");
        Ok(())
    }

    pub async fn exists(&self, table: &Table) -> IngestResult<bool> {
        let found: Option<String> = sqlx::query_scalar(TABLE_EXISTS_SQL)
            .bind(&self.database)
            .bind(table.name)
            .fetch_optional(&self.db)
            .await
            .map_err(|source| IngestError::Schema {
                table: table.name,
                source,
            })?;

        Ok(found.is_some())
    }

    async fn drop_table(&self, table: &Table) -> IngestResult<()> {
        debug!(table = table.name, "Dropping table");
        sqlx::query(&format!("DROP TABLE {}", table.name))
            .execute(&self.db)
            .await
            .map_err(|source| IngestError::Schema {
                table: table.name,
                source,
            })?;
        Ok(())
    }

    async fn create_table(&self, table: &Table) -> IngestResult<()> {
        debug!(table = table.name, "Creating table");
        sqlx::query(&table.create_sql())
            .execute(&self.db)
            .await
            .map_err(|source| IngestError::Schema {
                table: table.name,
                source,
            })?;
        Ok(())
    }
}
