//! Ingestion error taxonomy

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RecordType;
use crate::state::TransitionError;

pub type IngestResult<T> = Result<T, IngestError>;

/// Everything that can stop a run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Root directory does not hold exactly the four record-type directories
    #[error("DIRECTORY SHOULD CONTAIN: {} IN: {}", expected_dirs(), root.display())]
    Layout { root: PathBuf, found: Vec<String> },

    #[error("NOT A DIRECTORY: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema reset failed on table {table}: {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Insert into {table} failed ({params} parameters): {source}")]
    Insert {
        table: &'static str,
        statement: String,
        params: usize,
        #[source]
        source: sqlx::Error,
    },

    /// Caught before any SQL is built
    #[error("Row {row} has {actual} cells, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Chunk would bind more parameters than PostgreSQL accepts
    #[error("Insert into {table} needs {params} parameters, limit is {limit}")]
    TooManyParams {
        table: &'static str,
        params: usize,
        limit: usize,
    },

    #[error("Insert into {table} exceeded {secs}s")]
    Timeout { table: &'static str, secs: u64 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("PROCESS ALREADY RUNNING")]
    AlreadyRunning,

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable short name, used as the `kind` of recorded run errors
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Layout { .. } => "layout",
            IngestError::NotADirectory { .. } => "not_a_directory",
            IngestError::Io { .. } => "io",
            IngestError::Schema { .. } => "schema",
            IngestError::Insert { .. } => "insert",
            IngestError::RaggedRow { .. } => "ragged_row",
            IngestError::TooManyParams { .. } => "too_many_params",
            IngestError::Timeout { .. } => "timeout",
            IngestError::Cancelled => "cancelled",
            IngestError::AlreadyRunning => "already_running",
            IngestError::Transition(_) => "transition",
        }
    }
}

fn expected_dirs() -> String {
    RecordType::ALL
        .iter()
        .map(|t| format!("{}/", t.dir_name()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_message_lists_expected_dirs() {
        let err = IngestError::Layout {
            root: PathBuf::from("/data/csv"),
            found: vec![],
        };
        assert_eq!(
            err.to_string(),
            "DIRECTORY SHOULD CONTAIN: 0_caracteristiques/, 1_lieux/, 2_vehicules/, 3_usagers/ IN: /data/csv"
        );
        assert_eq!(err.kind(), "layout");
    }

    #[test]
    fn test_not_a_directory_message() {
        let err = IngestError::NotADirectory {
            path: PathBuf::from("/data/csv/1_lieux"),
        };
        assert_eq!(err.to_string(), "NOT A DIRECTORY: /data/csv/1_lieux");
    }
}
