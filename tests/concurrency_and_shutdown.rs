// tests/concurrency_and_shutdown.rs

mod common;
use crate::common::{FakeRunner, GraphBuilder, MemorySnapshotStore, TestResult, ids, names};
use crate::common::{init_tracing, options, options_with_run_id, with_timeout};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dagrun::dag::{TaskGraph, TaskSpec};
use dagrun::engine::{TaskOutcome, run_tasks, run_tasks_until};
use dagrun::errors::DagrunError;
use dagrun::exec::{InProcessRunner, Interrupted, TaskContext, Work, WorkRegistry};

fn fan_in(width: usize) -> TaskGraph {
    let mut builder = GraphBuilder::new().task("sink");
    for i in 0..width {
        let name = format!("leaf_{i}");
        builder = builder.task(&name).dep("sink", &name);
    }
    builder.build()
}

#[tokio::test]
async fn pool_size_bounds_running_attempts() -> TestResult {
    init_tracing();
    let graph = fan_in(12);
    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_millis(20)));

    let summary = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["sink"]),
        Arc::clone(&runner),
        &MemorySnapshotStore::new(),
        &options(3),
    ))
    .await?;

    assert_eq!(summary.done.len(), 13);
    assert!(runner.peak_concurrency() <= 3);
    assert!(runner.peak_concurrency() >= 2, "leaves should overlap");
    assert_eq!(runner.executed().last().map(String::as_str), Some("sink"));
    Ok(())
}

#[tokio::test]
async fn pool_of_one_runs_serially() -> TestResult {
    init_tracing();
    let graph = fan_in(4);
    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_millis(5)));

    with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["sink"]),
        Arc::clone(&runner),
        &MemorySnapshotStore::new(),
        &options(1),
    ))
    .await?;

    assert_eq!(runner.peak_concurrency(), 1);
    Ok(())
}

/// Fails until its third attempt and refuses to be run twice, so a reused
/// instance would show up as an error.
struct OneShot {
    used: bool,
}

impl Work for OneShot {
    fn run(&mut self, ctx: &TaskContext) -> anyhow::Result<()> {
        anyhow::ensure!(!self.used, "work instance reused");
        self.used = true;
        anyhow::ensure!(ctx.attempt >= 3, "attempt {} not good enough", ctx.attempt);
        Ok(())
    }
}

#[tokio::test]
async fn every_attempt_gets_fresh_work() -> TestResult {
    init_tracing();
    let builds = Arc::new(AtomicUsize::new(0));
    let mut registry = WorkRegistry::new();
    {
        let builds = Arc::clone(&builds);
        registry.register("one_shot", move |_config: &serde_json::Value| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(OneShot { used: false })
        });
    }

    let mut graph = TaskGraph::new();
    let task = graph.add_task(TaskSpec::new("stubborn", "one_shot").with_retries(2))?;

    let summary = with_timeout(run_tasks(
        &graph,
        &[task],
        InProcessRunner::new(registry),
        &MemorySnapshotStore::new(),
        &options(1),
    ))
    .await?;

    assert_eq!(summary.done, names(&["stubborn"]));
    assert_eq!(builds.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn panicking_work_counts_as_a_failed_attempt() {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut registry = WorkRegistry::new();
    {
        let attempts = Arc::clone(&attempts);
        registry.register_fn("boom", move |_ctx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            panic!("boom")
        });
    }
    registry.register_fn("noop", |_ctx| Ok(()));

    let mut graph = TaskGraph::new();
    let ok = graph.add_task(TaskSpec::new("fine", "noop")).unwrap();
    let boom = graph
        .add_task_with_deps(TaskSpec::new("explodes", "boom").with_retries(1), &[ok])
        .unwrap();

    let result = with_timeout(run_tasks(
        &graph,
        &[boom],
        InProcessRunner::new(registry),
        &MemorySnapshotStore::new(),
        &options(2),
    ))
    .await;

    let Err(DagrunError::Failed(failure)) = result else {
        panic!("expected SchedulerFailure");
    };
    assert_eq!(failure.failed, names(&["explodes"]));
    assert_eq!(failure.done, names(&["fine"]));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn interrupted_attempt_stops_the_run_without_a_snapshot() {
    init_tracing();
    let graph = GraphBuilder::new()
        .task_with_retries("first", 5)
        .task("second")
        .dep("second", "first")
        .build();
    let runner = Arc::new(FakeRunner::new().with_outcomes("first", [TaskOutcome::Interrupted]));
    let store = MemorySnapshotStore::new();

    let result = with_timeout(run_tasks(
        &graph,
        &ids(&graph, &["second"]),
        Arc::clone(&runner),
        &store,
        &options_with_run_id(1, "interrupted"),
    ))
    .await;

    assert!(matches!(result, Err(DagrunError::Interrupted)));
    assert_eq!(runner.attempts_of("first"), 1);
    assert_eq!(runner.attempts_of("second"), 0);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn shutdown_after_a_permanent_failure_keeps_the_failure() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().task("x").task("y").build();
    let runner = Arc::new(
        FakeRunner::new()
            .always_failing("x")
            .with_task_delay("y", Duration::from_secs(2)),
    );
    let store = MemorySnapshotStore::new();

    let result = with_timeout(run_tasks_until(
        &graph,
        &ids(&graph, &["x", "y"]),
        Arc::clone(&runner),
        &store,
        &options_with_run_id(2, "halted"),
        tokio::time::sleep(Duration::from_millis(300)),
    ))
    .await;

    let Err(DagrunError::Failed(failure)) = result else {
        panic!("expected the failure to survive shutdown");
    };
    assert_eq!(failure.failed, names(&["x"]));
    assert_eq!(failure.pending, names(&["y"]));
    assert!(failure.done.is_empty());

    assert_eq!(store.saves(), 1);
    let snapshot = store.get("halted").ok_or("snapshot saved on failure")?;
    assert_eq!(snapshot.failed, names(&["x"]));
    assert_eq!(snapshot.pending, names(&["y"]));
    Ok(())
}

#[tokio::test]
async fn cooperative_work_observes_shutdown() {
    init_tracing();
    let mut registry = WorkRegistry::new();
    registry.register_fn("poll", |ctx| {
        for _ in 0..500 {
            ctx.check_cancelled()?;
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(Interrupted.into())
    });

    let mut graph = TaskGraph::new();
    let task = graph.add_task(TaskSpec::new("long", "poll")).unwrap();

    let result = with_timeout(run_tasks_until(
        &graph,
        &[task],
        InProcessRunner::new(registry),
        &MemorySnapshotStore::new(),
        &options(1),
        tokio::time::sleep(Duration::from_millis(50)),
    ))
    .await;

    assert!(matches!(result, Err(DagrunError::Interrupted)));
}

#[tokio::test]
async fn shutdown_request_aborts_in_flight_work() {
    init_tracing();
    let graph = fan_in(3);
    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_secs(30)));

    let result = with_timeout(run_tasks_until(
        &graph,
        &ids(&graph, &["sink"]),
        Arc::clone(&runner),
        &MemorySnapshotStore::new(),
        &options(2),
        tokio::time::sleep(Duration::from_millis(50)),
    ))
    .await;

    assert!(matches!(result, Err(DagrunError::Interrupted)));
    assert_eq!(runner.attempts_of("sink"), 0);
}
