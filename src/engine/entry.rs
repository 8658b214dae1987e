// src/engine/entry.rs

//! One-call entry point: validate, resume, run, persist.

use std::collections::BTreeSet;
use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{RunOutcome, Scheduler, TaskGraph, TaskId};
use crate::engine::{RunOptions, RunSummary, Runtime, RuntimeEvent};
use crate::errors::{DagrunError, Result};
use crate::exec::TaskRunner;
use crate::snapshot::{ResumePlan, Snapshot, SnapshotStore};

/// Run `roots` and everything they transitively depend on.
///
/// With a run id in `options`, an existing snapshot for that id takes
/// precedence over `graph` and `roots`; a permanent failure saves a new
/// one and success removes it.
pub async fn run_tasks<R, S>(
    graph: &TaskGraph,
    roots: &[TaskId],
    runner: R,
    store: &S,
    options: &RunOptions,
) -> Result<RunSummary>
where
    R: TaskRunner,
    S: SnapshotStore + ?Sized,
{
    run_tasks_until(graph, roots, runner, store, options, std::future::pending()).await
}

/// Like [`run_tasks`], but requests a graceful shutdown once `shutdown`
/// resolves (e.g. on Ctrl-C).
///
/// A shutdown after a permanent failure still ends in
/// [`DagrunError::Failed`], and the snapshot is saved.
pub async fn run_tasks_until<R, S, F>(
    graph: &TaskGraph,
    roots: &[TaskId],
    runner: R,
    store: &S,
    options: &RunOptions,
    shutdown: F,
) -> Result<RunSummary>
where
    R: TaskRunner,
    S: SnapshotStore + ?Sized,
    F: Future<Output = ()> + Send + 'static,
{
    let run_id = options.run_id();

    let resumed = match run_id {
        Some(id) => match store.load(id)? {
            Some(snapshot) => {
                info!(
                    run_id = id,
                    pending = snapshot.pending.len(),
                    failed = snapshot.failed.len(),
                    done = snapshot.done.len(),
                    "resuming from snapshot"
                );
                if !roots.is_empty() {
                    debug!(
                        roots = roots.len(),
                        "ignoring requested roots in favour of the snapshot"
                    );
                }
                Some(snapshot.rebuild()?)
            }
            None => None,
        },
        None => None,
    };

    let (graph, roots, done): (&TaskGraph, &[TaskId], BTreeSet<TaskId>) = match &resumed {
        Some(ResumePlan { graph, roots, done }) => (graph, roots.as_slice(), done.clone()),
        None => (graph, roots, BTreeSet::new()),
    };

    let scheduler = Scheduler::new(graph, roots, done, options.default_retries)?;
    let (runtime, events) =
        Runtime::with_runner(scheduler, runner, options.pool_size, options.tick);

    let watcher = tokio::spawn(forward_shutdown(shutdown, events));
    let outcome = runtime.run().await;
    watcher.abort();

    match outcome? {
        RunOutcome::Success { done } => {
            if let Some(id) = run_id {
                store.delete(id)?;
            }
            let done: BTreeSet<String> = done.iter().map(|id| graph.name_of(*id)).collect();
            info!(done = done.len(), resumed = resumed.is_some(), "run succeeded");
            Ok(RunSummary {
                done,
                resumed: resumed.is_some(),
            })
        }
        RunOutcome::Failed(record) => {
            if let Some(id) = run_id {
                store.save(&Snapshot::from_record(graph, id, &record))?;
            }
            let failure = record.to_failure(graph);
            warn!(
                pending = failure.pending.len(),
                done = failure.done.len(),
                failed = ?failure.failed,
                "run failed"
            );
            Err(DagrunError::Failed(failure))
        }
    }
}

async fn forward_shutdown<F>(shutdown: F, events: mpsc::Sender<RuntimeEvent>)
where
    F: Future<Output = ()>,
{
    shutdown.await;
    if events.send(RuntimeEvent::ShutdownRequested).await.is_err() {
        debug!("runtime already finished; shutdown request dropped");
    }
}
