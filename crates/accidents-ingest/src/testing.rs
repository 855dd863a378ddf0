//! In-memory [`IngestStore`] for tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{IngestError, IngestResult};
use crate::loader::InsertStatement;
use crate::store::IngestStore;

/// Records every statement instead of executing it
#[derive(Default)]
pub struct RecordingStore {
    statements: Mutex<Vec<InsertStatement>>,
    resets: Mutex<usize>,
    insert_delay: Option<Duration>,
    fail_inserts_after: Option<usize>,
    gate: Option<Arc<Notify>>,
}

impl RecordingStore {
    /// Sleep this long inside every insert
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Accept `n` inserts, then fail every following one
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_inserts_after = Some(n);
        self
    }

    /// Block `reset_schema` until the returned handle is notified
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn statements(&self) -> Vec<InsertStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn resets(&self) -> usize {
        *self.resets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IngestStore for RecordingStore {
    async fn reset_schema(&self) -> IngestResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        *self.resets.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    async fn insert(&self, statement: &InsertStatement) -> IngestResult<u64> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let mut statements = self.statements.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fail_inserts_after.is_some_and(|n| statements.len() >= n) {
            return Err(IngestError::Insert {
                table: statement.table().name,
                statement: statement.sql().to_string(),
                params: statement.param_count(),
                source: sqlx::Error::Protocol("injected failure".to_string()),
            });
        }

        statements.push(statement.clone());
        Ok(statement.row_count() as u64)
    }
}
