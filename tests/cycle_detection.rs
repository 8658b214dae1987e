// tests/cycle_detection.rs

mod common;
use crate::common::{FakeRunner, GraphBuilder, MemorySnapshotStore, TestResult, ids, names};
use crate::common::{init_tracing, options, options_with_run_id, with_timeout};

use std::sync::Arc;

use dagrun::engine::run_tasks;
use dagrun::errors::DagrunError;

#[tokio::test]
async fn cycle_is_reported_with_its_path_before_anything_runs() {
    init_tracing();
    // A -> B -> C -> A
    let graph = GraphBuilder::new()
        .task("A")
        .task("B")
        .task("C")
        .dep("A", "B")
        .dep("B", "C")
        .dep("C", "A")
        .build();
    let runner = Arc::new(FakeRunner::new());
    let store = MemorySnapshotStore::new();

    let result = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["A"]),
        Arc::clone(&runner),
        &store,
        &options_with_run_id(2, "cyclic"),
    ))
    .await;

    match result {
        Err(DagrunError::CircularDependency(cycle)) => {
            assert_eq!(cycle.path, ["A", "B", "C", "A"]);
            assert_eq!(cycle.to_string(), "Circular dependency: A -> B -> C -> A");
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert!(runner.executed().is_empty());
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn cycle_below_the_roots_is_found() {
    init_tracing();
    // report -> merge -> left -> right -> merge
    let graph = GraphBuilder::new()
        .task("report")
        .task("merge")
        .task("left")
        .task("right")
        .dep("report", "merge")
        .dep("merge", "left")
        .dep("left", "right")
        .dep("right", "merge")
        .build();

    let result = run_tasks(
        &graph,
        &ids(&graph, &["report"]),
        FakeRunner::new(),
        &MemorySnapshotStore::new(),
        &options(1),
    )
    .await;

    let Err(DagrunError::CircularDependency(cycle)) = result else {
        panic!("expected a cycle error");
    };
    assert_eq!(cycle.path, ["merge", "left", "right", "merge"]);
}

#[tokio::test]
async fn unreachable_cycle_does_not_block_the_run() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new()
        .task("ok")
        .task("x")
        .task("y")
        .dep("x", "y")
        .dep("y", "x")
        .build();
    let runner = Arc::new(FakeRunner::new());

    let summary = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["ok"]),
        Arc::clone(&runner),
        &MemorySnapshotStore::new(),
        &options(1),
    ))
    .await?;

    assert_eq!(summary.done, names(&["ok"]));
    Ok(())
}
