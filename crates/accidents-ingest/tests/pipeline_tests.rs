//! Pipeline tests against an in-memory store
//!
//! These exercise layout validation, parsing, chunking, loading and the run
//! state machine end to end without a database.

use accidents_ingest::{
    config::IngestConfig, testing::RecordingStore, IngestError, Pipeline, RunStatus,
    StartOutcome,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIRS: [&str; 4] = ["0_caracteristiques", "1_lieux", "2_vehicules", "3_usagers"];

/// Ingestion root with the four record-type directories
fn csv_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for dir in DIRS {
        std::fs::create_dir(root.path().join(dir)).unwrap();
    }
    root
}

fn write_file(root: &Path, dir: &str, name: &str, content: &str) {
    std::fs::write(root.join(dir).join(name), content).unwrap();
}

fn pipeline(root: &Path, chunk_size: usize, store: Arc<RecordingStore>) -> Arc<Pipeline> {
    let config = IngestConfig {
        csv_root: root.to_path_buf(),
        chunk_size,
        statement_timeout_secs: 5,
    };
    Arc::new(Pipeline::new(config, store))
}

async fn wait_until_idle(pipeline: &Pipeline) {
    for _ in 0..200 {
        if pipeline.snapshot().status.is_idle() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pipeline did not return to idle");
}

async fn wait_for_status(pipeline: &Pipeline, expected: RunStatus) {
    for _ in 0..200 {
        if pipeline.snapshot().status == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pipeline never reached {expected}");
}

#[tokio::test]
async fn test_single_characteristics_file_end_to_end() {
    let root = csv_root();
    write_file(
        root.path(),
        "0_caracteristiques",
        "caracteristiques-2019.csv",
        "Num_Acc;an;mois\n201900000001;2019;11\n201900000002;2019;\n201900000003;2019;12\n",
    );

    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(root.path(), 200, store.clone());

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.rows_inserted, 3);

    assert_eq!(store.resets(), 1);
    let statements = store.statements();
    assert_eq!(statements.len(), 1);

    let statement = &statements[0];
    assert_eq!(statement.table().name, "events");
    assert_eq!(statement.column_list(), "num_acc,an,mois");
    assert_eq!(statement.row_count(), 3);
    assert_eq!(statement.param_count(), 9);
    assert!(statement.sql().ends_with("VALUES ($1,$2,$3),($4,$5,$6),($7,$8,$9)"));
    assert_eq!(statement.params()[5], None);

    let snapshot = pipeline.snapshot();
    assert!(snapshot.status.is_idle());
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.files_loaded, 1);
    assert_eq!(snapshot.rows_loaded, 3);
    assert!(snapshot.finished_at.is_some());
}

#[tokio::test]
async fn test_large_file_is_chunked() {
    let root = csv_root();
    let mut content = String::from("num_acc,an\n");
    for i in 0..450 {
        content.push_str(&format!("{i},2019\n"));
    }
    write_file(root.path(), "0_caracteristiques", "big.csv", &content);

    let store = Arc::new(RecordingStore::default());
    let report = pipeline(root.path(), 200, store.clone()).run().await.unwrap();

    let sizes: Vec<_> = store.statements().iter().map(|s| s.row_count()).collect();
    assert_eq!(sizes, vec![200, 200, 50]);
    assert_eq!(report.rows_inserted, 450);
}

#[tokio::test]
async fn test_unpersisted_types_are_parsed_and_skipped() {
    let root = csv_root();
    write_file(root.path(), "1_lieux", "lieux.csv", "Num_Acc;catr\n1;3\n2;4\n");
    write_file(root.path(), "2_vehicules", "vehicules.csv", "Num_Acc;num_veh\n1;A01\n");
    write_file(root.path(), "3_usagers", "notes.txt", "ignored");

    let store = Arc::new(RecordingStore::default());
    let report = pipeline(root.path(), 200, store.clone()).run().await.unwrap();

    assert!(store.statements().is_empty());
    assert_eq!(report.files_loaded, 2);
    assert_eq!(report.rows_skipped, 3);
    assert_eq!(report.rows_inserted, 0);
}

#[tokio::test]
async fn test_bad_layout_fails_before_schema_reset() {
    let root = tempfile::tempdir().unwrap();
    for dir in &DIRS[..3] {
        std::fs::create_dir(root.path().join(dir)).unwrap();
    }

    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(root.path(), 200, store.clone());

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, IngestError::Layout { .. }));
    assert_eq!(store.resets(), 0);

    let snapshot = pipeline.snapshot();
    assert!(snapshot.status.is_idle());
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].kind, "layout");
}

#[tokio::test]
async fn test_start_reports_layout_error() {
    let root = csv_root();
    std::fs::remove_dir(root.path().join("3_usagers")).unwrap();
    std::fs::write(root.path().join("3_usagers"), "not a directory").unwrap();

    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(root.path(), 200, store.clone());

    match pipeline.start().await {
        StartOutcome::Failed(IngestError::NotADirectory { path }) => {
            assert_eq!(path, root.path().join("3_usagers"));
        },
        other => panic!("expected not-a-directory, got {other:?}"),
    }
    assert!(pipeline.snapshot().status.is_idle());
    assert_eq!(store.resets(), 0);
}

#[tokio::test]
async fn test_second_trigger_rejected_while_running() {
    let root = csv_root();
    write_file(root.path(), "0_caracteristiques", "a.csv", "num_acc\n1\n");

    let (store, gate) = RecordingStore::default().gated();
    let store = Arc::new(store);
    let pipeline = pipeline(root.path(), 200, store.clone());

    assert!(matches!(pipeline.start().await, StartOutcome::Started));
    wait_for_status(&pipeline, RunStatus::Clearing).await;

    assert!(matches!(pipeline.start().await, StartOutcome::AlreadyRunning));
    assert!(matches!(pipeline.run().await, Err(IngestError::AlreadyRunning)));
    assert_eq!(pipeline.snapshot().status, RunStatus::Clearing);

    gate.notify_one();
    wait_until_idle(&pipeline).await;

    let snapshot = pipeline.snapshot();
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.rows_loaded, 1);
    assert_eq!(store.statements().len(), 1);
}

#[tokio::test]
async fn test_insert_failure_stops_run_and_keeps_earlier_chunks() {
    let root = csv_root();
    write_file(
        root.path(),
        "0_caracteristiques",
        "a.csv",
        "num_acc,an\n1,2019\n2,2019\n3,2019\n4,2019\n5,2019\n",
    );
    write_file(root.path(), "0_caracteristiques", "b.csv", "num_acc,an\n6,2019\n");

    let store = Arc::new(RecordingStore::default().failing_after(1));
    let pipeline = pipeline(root.path(), 2, store.clone());

    let err = pipeline.run().await.unwrap_err();
    match err {
        IngestError::Insert { table, params, .. } => {
            assert_eq!(table, "events");
            assert_eq!(params, 4);
        },
        other => panic!("expected insert error, got {other:?}"),
    }

    // First chunk stays, nothing after the failure is attempted
    assert_eq!(store.statements().len(), 1);

    let snapshot = pipeline.snapshot();
    assert!(snapshot.status.is_idle());
    assert_eq!(snapshot.files_loaded, 0);
    assert_eq!(snapshot.errors.last().map(|e| e.kind.as_str()), Some("insert"));
}

#[tokio::test]
async fn test_ragged_row_fails_before_insert() {
    let root = csv_root();
    write_file(
        root.path(),
        "0_caracteristiques",
        "ragged.csv",
        "num_acc,an,mois\n1,2019,11\n2,2019\n",
    );

    let store = Arc::new(RecordingStore::default());
    let err = pipeline(root.path(), 200, store.clone()).run().await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::RaggedRow {
            row: 2,
            expected: 3,
            actual: 2
        }
    ));
    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_cancel_stops_before_next_file() {
    let root = csv_root();
    write_file(root.path(), "0_caracteristiques", "a.csv", "num_acc\n1\n");

    let (store, gate) = RecordingStore::default().gated();
    let store = Arc::new(store);
    let pipeline = pipeline(root.path(), 200, store.clone());

    assert!(!pipeline.cancel());
    assert!(matches!(pipeline.start().await, StartOutcome::Started));
    wait_for_status(&pipeline, RunStatus::Clearing).await;

    assert!(pipeline.cancel());
    gate.notify_one();
    wait_until_idle(&pipeline).await;

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.errors.last().map(|e| e.kind.as_str()), Some("cancelled"));
    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_runs_can_repeat() {
    let root = csv_root();
    write_file(root.path(), "0_caracteristiques", "a.csv", "num_acc\n1\n");

    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(root.path(), 200, store.clone());

    pipeline.run().await.unwrap();
    pipeline.run().await.unwrap();

    assert_eq!(store.resets(), 2);
    assert_eq!(store.statements().len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_is_recorded_before_wait_idle_returns() {
    let root = csv_root();
    write_file(root.path(), "0_caracteristiques", "a.csv", "num_acc\n1\n");

    let (store, gate) = RecordingStore::default().gated();
    let pipeline = pipeline(root.path(), 200, Arc::new(store));

    assert!(pipeline.wait_idle(Duration::from_millis(10)).await);
    assert!(matches!(pipeline.start().await, StartOutcome::Started));
    wait_for_status(&pipeline, RunStatus::Clearing).await;

    // Still blocked in the schema reset
    assert!(!pipeline.wait_idle(Duration::from_millis(100)).await);

    assert!(pipeline.cancel());
    gate.notify_one();
    assert!(pipeline.wait_idle(Duration::from_secs(2)).await);

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.errors.last().map(|e| e.kind.as_str()), Some("cancelled"));
}
