//! Run state machine
//!
//! ```text
//! Idle -> Checking -> Clearing -> Saving -> SavingFile(p1) -> SavingFile(p2) ... -> Idle
//!            \___________\___________\___________\________ failure ________/
//! ```
//!
//! The idle check and the move to `Checking` happen under one lock, so two
//! simultaneous triggers can never both start a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::IngestError;

/// Where the current run is
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Checking,
    Clearing,
    Saving,
    SavingFile { path: PathBuf },
}

impl RunStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunStatus::Idle)
    }

    /// Forward transitions only; returning to `Idle` goes through the guard
    fn can_advance_to(&self, next: &RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Checking, RunStatus::Clearing)
                | (RunStatus::Clearing, RunStatus::Saving)
                | (RunStatus::Saving, RunStatus::SavingFile { .. })
                | (RunStatus::SavingFile { .. }, RunStatus::SavingFile { .. })
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Idle => f.write_str("idle"),
            RunStatus::Checking => f.write_str("checking"),
            RunStatus::Clearing => f.write_str("clearing"),
            RunStatus::Saving => f.write_str("saving"),
            RunStatus::SavingFile { path } => write!(f, "saving file {}", path.display()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid run transition from {from} to {to}")]
pub struct TransitionError {
    pub from: String,
    pub to: String,
}

/// One failure, as shown to status observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Read-only copy of the run state
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSnapshot {
    #[serde(flatten)]
    pub status: RunStatus,
    /// Every error since process start, oldest first
    pub errors: Vec<ErrorRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files_loaded: usize,
    pub rows_loaded: u64,
}

#[derive(Default)]
struct RunState {
    snapshot: RunSnapshot,
    cancel: Option<CancellationToken>,
}

/// Owner of the process-wide run state
#[derive(Clone, Default)]
pub struct RunTracker {
    state: Arc<Mutex<RunState>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().snapshot.clone()
    }

    /// Move `Idle -> Checking` atomically; `None` when a run is already active
    pub fn try_begin(&self) -> Option<RunGuard> {
        let mut state = self.lock();
        if !state.snapshot.status.is_idle() {
            return None;
        }

        let token = CancellationToken::new();
        state.cancel = Some(token.clone());
        let snapshot = &mut state.snapshot;
        snapshot.status = RunStatus::Checking;
        snapshot.started_at = Some(Utc::now());
        snapshot.finished_at = None;
        snapshot.files_loaded = 0;
        snapshot.rows_loaded = 0;

        Some(RunGuard {
            tracker: self.clone(),
            token,
            done: false,
        })
    }

    /// Request cancellation of the active run. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let state = self.lock();
        match (&state.cancel, state.snapshot.status.is_idle()) {
            (Some(token), false) => {
                token.cancel();
                true
            },
            _ => false,
        }
    }

    fn end(&self, error: Option<ErrorRecord>) {
        let mut state = self.lock();
        state.cancel = None;
        let snapshot = &mut state.snapshot;
        snapshot.status = RunStatus::Idle;
        snapshot.finished_at = Some(Utc::now());
        if let Some(error) = error {
            snapshot.errors.push(error);
        }
    }
}

/// Exclusive handle on the active run.
///
/// Dropping it without [`RunGuard::finish`] or [`RunGuard::fail`] (a panic,
/// an aborted task) still returns the tracker to `Idle`.
pub struct RunGuard {
    tracker: RunTracker,
    token: CancellationToken,
    done: bool,
}

impl RunGuard {
    pub fn advance(&self, next: RunStatus) -> Result<(), TransitionError> {
        let mut state = self.tracker.lock();
        let current = &mut state.snapshot.status;
        if !current.can_advance_to(&next) {
            return Err(TransitionError {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        *current = next;
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        self.tracker.lock().snapshot.status.clone()
    }

    /// Count a fully loaded file
    pub fn record_file(&self, rows: u64) {
        let mut state = self.tracker.lock();
        state.snapshot.files_loaded += 1;
        state.snapshot.rows_loaded += rows;
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn finish(mut self) {
        self.done = true;
        self.tracker.end(None);
    }

    pub fn fail(mut self, error: &IngestError) {
        self.done = true;
        self.tracker
            .end(Some(ErrorRecord::new(error.kind(), error.to_string())));
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.done {
            warn!("Run ended without completing; resetting to idle");
            self.tracker
                .end(Some(ErrorRecord::new("aborted", "Run ended unexpectedly")));
        }
    }
}
