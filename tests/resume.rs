// tests/resume.rs

mod common;
use crate::common::{FakeRunner, GraphBuilder, MemorySnapshotStore, TestResult, ids, names};
use crate::common::{init_tracing, options, options_with_run_id, with_timeout};

use std::sync::Arc;

use dagrun::dag::TaskGraph;
use dagrun::engine::run_tasks;
use dagrun::errors::DagrunError;
use dagrun::snapshot::{FileSnapshotStore, SnapshotStore};

/// extract_2 <- faulty <- extract_1 <- blessed
fn pipeline() -> TaskGraph {
    GraphBuilder::new()
        .task("blessed")
        .task("extract_1")
        .task_with_retries("faulty", 1)
        .task("extract_2")
        .dep("extract_1", "blessed")
        .dep("faulty", "extract_1")
        .dep("extract_2", "faulty")
        .build()
}

#[tokio::test]
async fn failed_run_resumes_without_redoing_done_tasks() -> TestResult {
    init_tracing();
    let graph = pipeline();
    let roots = ids(&graph, &["extract_2"]);
    let store = MemorySnapshotStore::new();
    let opts = options_with_run_id(2, "nightly");

    let broken = Arc::new(FakeRunner::new().always_failing("faulty"));
    let first = with_timeout(run_tasks(&graph, &roots, Arc::clone(&broken), &store, &opts)).await;
    assert!(matches!(first, Err(DagrunError::Failed(_))));
    assert_eq!(broken.attempts_of("faulty"), 2);

    let snapshot = store.get("nightly").expect("snapshot saved on failure");
    assert_eq!(snapshot.failed, names(&["faulty"]));
    assert_eq!(snapshot.pending, names(&["extract_2"]));
    assert_eq!(snapshot.done, names(&["blessed", "extract_1"]));

    // The fault is fixed; the requested roots are superseded by the snapshot.
    let fixed = Arc::new(FakeRunner::new());
    let summary = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["blessed"]),
        Arc::clone(&fixed),
        &store,
        &opts,
    ))
    .await?;

    assert!(summary.resumed);
    assert_eq!(fixed.executed(), ["faulty", "extract_2"]);
    assert_eq!(
        summary.done,
        names(&["blessed", "extract_1", "faulty", "extract_2"])
    );
    assert!(store.get("nightly").is_none(), "snapshot cleared on success");
    Ok(())
}

#[tokio::test]
async fn resumed_tasks_get_a_fresh_retry_budget() -> TestResult {
    init_tracing();
    let graph = pipeline();
    let roots = ids(&graph, &["extract_2"]);
    let store = MemorySnapshotStore::new();
    let opts = options_with_run_id(1, "budget");

    let broken = Arc::new(FakeRunner::new().always_failing("faulty"));
    let _ = with_timeout(run_tasks(&graph, &roots, Arc::clone(&broken), &store, &opts)).await;

    // Still flaky, but one retry is enough again.
    let flaky = Arc::new(FakeRunner::new().failing_times("faulty", 1));
    with_timeout(run_tasks(&graph, &roots, Arc::clone(&flaky), &store, &opts)).await?;

    assert_eq!(flaky.attempt_numbers("faulty"), [1, 2]);
    Ok(())
}

#[tokio::test]
async fn repeated_failure_overwrites_snapshot() {
    init_tracing();
    let graph = pipeline();
    let roots = ids(&graph, &["extract_2"]);
    let store = MemorySnapshotStore::new();
    let opts = options_with_run_id(1, "again");

    for _ in 0..2 {
        let broken = Arc::new(FakeRunner::new().always_failing("faulty"));
        let result = with_timeout(run_tasks(&graph, &roots, Arc::clone(&broken), &store, &opts)).await;
        assert!(matches!(result, Err(DagrunError::Failed(_))));
    }

    assert_eq!(store.saves(), 2);
    let snapshot = store.get("again").expect("snapshot");
    assert_eq!(snapshot.done, names(&["blessed", "extract_1"]));
    assert_eq!(snapshot.failed, names(&["faulty"]));
}

#[tokio::test]
async fn without_run_id_nothing_is_persisted() {
    init_tracing();
    let graph = pipeline();
    let store = MemorySnapshotStore::new();

    let result = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["extract_2"]),
        FakeRunner::new().always_failing("faulty"),
        &store,
        &options(1),
    ))
    .await;

    assert!(matches!(result, Err(DagrunError::Failed(_))));
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn file_snapshot_rebuilds_graph_in_a_fresh_process() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store = FileSnapshotStore::new(dir.path().join("state"));
    let opts = options_with_run_id(2, "daily");

    {
        let graph = pipeline();
        let broken = Arc::new(FakeRunner::new().always_failing("faulty"));
        let result = with_timeout(run_tasks(
            &graph,
            &ids(&graph, &["extract_2"]),
            Arc::clone(&broken),
            &store,
            &opts,
        ))
        .await;
        assert!(matches!(result, Err(DagrunError::Failed(_))));
    }

    let path = store.path_for("daily")?;
    assert!(path.exists());
    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("\"faulty\""));

    // An empty graph is enough: the snapshot carries every task.
    let fixed = Arc::new(FakeRunner::new());
    let summary = with_timeout(run_tasks(
        &TaskGraph::new(),
        &[],
        Arc::clone(&fixed),
        &store,
        &opts,
    ))
    .await?;

    assert!(summary.resumed);
    assert_eq!(fixed.executed(), ["faulty", "extract_2"]);
    assert!(!path.exists());
    assert!(store.load("daily")?.is_none());
    Ok(())
}
