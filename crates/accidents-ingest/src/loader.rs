//! Chunk-to-statement mapping and execution
//!
//! One chunk becomes one multi-row `INSERT`. Column names come from the file
//! header as-is; a header that does not match the table surfaces as a
//! database error at execution time.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{IngestError, IngestResult};
use crate::models::{cell_value, Chunk, RecordType, Table};
use crate::store::IngestStore;

/// Bind parameters PostgreSQL accepts in one statement
pub const MAX_BIND_PARAMS: usize = 65_535;

/// A parameterized multi-row insert, ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: &'static Table,
    columns: Vec<String>,
    sql: String,
    params: Vec<Option<String>>,
    rows: usize,
}

impl InsertStatement {
    /// Build the statement for one chunk.
    ///
    /// Returns `None` for record types that are not persisted.
    pub fn build(record_type: RecordType, chunk: &Chunk<'_>) -> IngestResult<Option<Self>> {
        let Some(table) = record_type.persisted_table() else {
            return Ok(None);
        };

        let mut builder = InsertBuilder::new(table, chunk.header);
        for (i, row) in chunk.rows.iter().enumerate() {
            builder.push_row(chunk.offset + i + 1, row)?;
        }

        Ok(builder.finish())
    }

    pub fn table(&self) -> &'static Table {
        self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Comma-joined column names, e.g. `num_acc,an`
    pub fn column_list(&self) -> String {
        self.columns.join(",")
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values in row-major order; `None` binds NULL
    pub fn params(&self) -> &[Option<String>] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }
}

/// Length-checked accumulator for [`InsertStatement`] parameters.
///
/// Every row must have exactly one cell per header column, so placeholder
/// numbering and bound values cannot drift apart.
pub struct InsertBuilder<'h> {
    table: &'static Table,
    header: &'h [String],
    params: Vec<Option<String>>,
    rows: usize,
}

impl<'h> InsertBuilder<'h> {
    pub fn new(table: &'static Table, header: &'h [String]) -> Self {
        Self {
            table,
            header,
            params: Vec::new(),
            rows: 0,
        }
    }

    /// Append one row. `row_number` is only used for error reporting.
    pub fn push_row(&mut self, row_number: usize, row: &[String]) -> IngestResult<()> {
        if row.len() != self.header.len() {
            return Err(IngestError::RaggedRow {
                row: row_number,
                expected: self.header.len(),
                actual: row.len(),
            });
        }

        let params = self.params.len() + row.len();
        if params > MAX_BIND_PARAMS {
            return Err(IngestError::TooManyParams {
                table: self.table.name,
                params,
                limit: MAX_BIND_PARAMS,
            });
        }

        self.params
            .extend(row.iter().map(|cell| cell_value(cell).map(str::to_string)));
        self.rows += 1;
        Ok(())
    }

    /// `None` when no row was pushed or the header is empty
    pub fn finish(self) -> Option<InsertStatement> {
        let width = self.header.len();
        if self.rows == 0 || width == 0 {
            return None;
        }

        let column_sql = self
            .header
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(",");

        let values_sql = (0..self.rows)
            .map(|row| {
                let placeholders = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({placeholders})")
            })
            .collect::<Vec<_>>()
            .join(",");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table.name, column_sql, values_sql
        );

        Some(InsertStatement {
            table: self.table,
            columns: self.header.to_vec(),
            sql,
            params: self.params,
            rows: self.rows,
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// What happened to a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Inserted { rows: u64 },
    /// Record type has no wired destination; nothing was written
    Skipped { rows: usize },
}

/// Turns chunks into executed statements
#[derive(Clone)]
pub struct ChunkLoader {
    store: Arc<dyn IngestStore>,
    statement_timeout: Duration,
}

impl ChunkLoader {
    pub fn new(store: Arc<dyn IngestStore>, statement_timeout: Duration) -> Self {
        Self {
            store,
            statement_timeout,
        }
    }

    /// Build and execute the insert for one chunk. Failures are not retried.
    pub async fn load(&self, record_type: RecordType, chunk: &Chunk<'_>) -> IngestResult<LoadOutcome> {
        let Some(statement) = InsertStatement::build(record_type, chunk)? else {
            trace!(record_type = %record_type, rows = chunk.len(), "Chunk skipped");
            return Ok(LoadOutcome::Skipped { rows: chunk.len() });
        };

        let table = statement.table().name;
        debug!(
            table,
            rows = statement.row_count(),
            params = statement.param_count(),
            columns = %statement.column_list(),
            "Executing insert"
        );

        let rows = tokio::time::timeout(self.statement_timeout, self.store.insert(&statement))
            .await
            .map_err(|_| IngestError::Timeout {
                table,
                secs: self.statement_timeout.as_secs(),
            })??;

        Ok(LoadOutcome::Inserted { rows })
    }
}
