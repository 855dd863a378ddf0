//! Ingestion pipeline orchestrator
//!
//! Validate layout -> reset schema -> for each record type, for each CSV
//! file: parse -> chunk -> insert. Everything runs sequentially and stops at
//! the first error; chunks inserted before the failure stay committed.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::batcher::chunks;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::layout::{list_csv_files, validate_layout, Layout};
use crate::loader::{ChunkLoader, LoadOutcome};
use crate::models::RecordType;
use crate::parser::parse_file;
use crate::state::{RunGuard, RunSnapshot, RunStatus, RunTracker};
use crate::store::IngestStore;

/// Reply to a trigger request
#[derive(Debug)]
pub enum StartOutcome {
    /// Layout accepted; loading continues in the background
    Started,
    AlreadyRunning,
    /// Rejected before anything was dropped
    Failed(IngestError),
}

/// Totals for a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub files_loaded: usize,
    pub rows_inserted: u64,
    /// Rows parsed for record types that are not persisted
    pub rows_skipped: usize,
}

/// The ingestion pipeline and its run state
pub struct Pipeline {
    config: IngestConfig,
    store: Arc<dyn IngestStore>,
    loader: ChunkLoader,
    tracker: RunTracker,
}

impl Pipeline {
    pub fn new(config: IngestConfig, store: Arc<dyn IngestStore>) -> Self {
        let loader = ChunkLoader::new(store.clone(), config.statement_timeout());
        Self {
            config,
            store,
            loader,
            tracker: RunTracker::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.tracker.snapshot()
    }

    /// Ask the active run to stop at its next file or chunk boundary
    pub fn cancel(&self) -> bool {
        let cancelled = self.tracker.cancel();
        if cancelled {
            info!("Cancellation requested");
        }
        cancelled
    }

    /// Wait until no run is active. Returns false if `limit` elapsed first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let poll = async {
            while !self.tracker.snapshot().status.is_idle() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(limit, poll).await.is_ok()
    }

    /// Accept a run: validate the layout now, load in a background task.
    ///
    /// `Started` means accepted, not completed; completion and late errors
    /// are only visible through [`Pipeline::snapshot`].
    pub async fn start(self: &Arc<Self>) -> StartOutcome {
        let Some(run) = self.tracker.try_begin() else {
            info!("Ingestion already running, trigger ignored");
            return StartOutcome::AlreadyRunning;
        };

        let layout = match self.check(&run).await {
            Ok(layout) => layout,
            Err(e) => {
                run.fail(&e);
                return StartOutcome::Failed(e);
            },
        };

        let pipeline = Arc::clone(self);
        tokio::spawn(
            async move {
                // Outcome is recorded in the run state
                let _ = pipeline.complete(run, layout).await;
            }
            .instrument(info_span!("ingest_run")),
        );

        StartOutcome::Started
    }

    /// Run the whole pipeline and wait for it to finish
    pub async fn run(&self) -> IngestResult<RunReport> {
        let Some(run) = self.tracker.try_begin() else {
            return Err(IngestError::AlreadyRunning);
        };

        let layout = match self.check(&run).await {
            Ok(layout) => layout,
            Err(e) => {
                run.fail(&e);
                return Err(e);
            },
        };

        self.complete(run, layout).await
    }

    async fn check(&self, run: &RunGuard) -> IngestResult<Layout> {
        debug_assert_eq!(run.status(), RunStatus::Checking);
        let root = &self.config.csv_root;
        validate_layout(root).await.inspect_err(|e| {
            error!(root = %root.display(), error = %e, "Ingestion root rejected");
        })
    }

    async fn complete(&self, run: RunGuard, layout: Layout) -> IngestResult<RunReport> {
        match self.load_all(&run, &layout).await {
            Ok(report) => {
                info!(
                    files = report.files_loaded,
                    rows_inserted = report.rows_inserted,
                    rows_skipped = report.rows_skipped,
                    "Ingestion run completed"
                );
                run.finish();
                Ok(report)
            },
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Ingestion run failed");
                run.fail(&e);
                Err(e)
            },
        }
    }

    async fn load_all(&self, run: &RunGuard, layout: &Layout) -> IngestResult<RunReport> {
        run.advance(RunStatus::Clearing)?;
        self.store.reset_schema().await?;

        run.advance(RunStatus::Saving)?;
        let mut report = RunReport::default();

        for record_type in RecordType::ALL {
            let files = list_csv_files(&layout.dir(record_type)).await?;
            info!(record_type = %record_type, files = files.len(), "Loading record type");
            if record_type.persisted_table().is_none() && !files.is_empty() {
                warn!(record_type = %record_type, "Record type is parsed but not persisted");
            }

            for path in files {
                ensure_running(run)?;
                run.advance(RunStatus::SavingFile { path: path.clone() })?;

                let (inserted, skipped) = self.load_file(run, record_type, &path).await?;
                run.record_file(inserted);
                report.files_loaded += 1;
                report.rows_inserted += inserted;
                report.rows_skipped += skipped;
            }
        }

        Ok(report)
    }

    #[instrument(skip(self, run, path), fields(path = %path.display()))]
    async fn load_file(
        &self,
        run: &RunGuard,
        record_type: RecordType,
        path: &Path,
    ) -> IngestResult<(u64, usize)> {
        let table = parse_file(path).await?;
        let mut inserted = 0;
        let mut skipped = 0;

        for chunk in chunks(&table, self.config.chunk_size) {
            ensure_running(run)?;

            let outcome = tokio::select! {
                _ = run.cancellation().cancelled() => return Err(IngestError::Cancelled),
                outcome = self.loader.load(record_type, &chunk) => outcome?,
            };

            match outcome {
                LoadOutcome::Inserted { rows } => inserted += rows,
                LoadOutcome::Skipped { rows } => skipped += rows,
            }
        }

        info!(
            columns = table.header.len(),
            rows = table.rows.len(),
            inserted,
            "File loaded"
        );

        Ok((inserted, skipped))
    }
}

fn ensure_running(run: &RunGuard) -> IngestResult<()> {
    if run.cancellation().is_cancelled() {
        return Err(IngestError::Cancelled);
    }
    Ok(())
}
