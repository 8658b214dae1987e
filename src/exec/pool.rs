// src/exec/pool.rs

//! Bounded worker pool.
//!
//! Each submitted attempt becomes a Tokio task that first acquires one of
//! `size` semaphore permits, runs the attempt through the [`TaskRunner`],
//! and reports the outcome back to the runtime as a
//! [`RuntimeEvent::TaskCompleted`]. At most `size` attempts are inside the
//! runner at any instant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::dag::{ScheduledTask, TaskId};
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::backend::TaskRunner;

pub struct WorkerPool<R: TaskRunner> {
    runner: Arc<R>,
    size: usize,
    permits: Arc<Semaphore>,
    workers: JoinSet<()>,
    /// Which task each live worker is running.
    in_flight: HashMap<tokio::task::Id, TaskId>,
    events: mpsc::Sender<RuntimeEvent>,
    shutdown: watch::Sender<bool>,
}

impl<R: TaskRunner> std::fmt::Debug for WorkerPool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl<R: TaskRunner> WorkerPool<R> {
    /// Create a pool of `size` slots (clamped to at least 1) reporting to
    /// `events`.
    pub fn new(runner: R, size: usize, events: mpsc::Sender<RuntimeEvent>) -> Self {
        let size = size.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            runner: Arc::new(runner),
            size,
            permits: Arc::new(Semaphore::new(size)),
            workers: JoinSet::new(),
            in_flight: HashMap::new(),
            events,
            shutdown,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers submitted and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Queue one attempt. It starts as soon as a slot is free.
    pub fn submit(&mut self, task: ScheduledTask) {
        let runner = Arc::clone(&self.runner);
        let permits = Arc::clone(&self.permits);
        let events = self.events.clone();
        let shutdown = self.shutdown.subscribe();
        let id = task.id;

        let handle = self.workers.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!(task = %task.name, "pool closed before attempt started");
                return;
            };
            let name = task.name.clone();
            debug!(task = %name, attempt = task.attempt, "worker slot acquired");

            let outcome = runner.run(task, shutdown).await;
            if events
                .send(RuntimeEvent::TaskCompleted { task: id, outcome })
                .await
                .is_err()
            {
                debug!(task = %name, "runtime gone; dropping completion");
            }
        });

        self.in_flight.insert(handle.id(), id);
    }

    /// Reap finished workers.
    ///
    /// Completions normally arrive over the event channel; a worker that
    /// panicked never sent one, so a failure is synthesized for it here.
    pub fn reap(&mut self) -> Vec<RuntimeEvent> {
        let mut synthesized = Vec::new();

        while let Some(joined) = self.workers.try_join_next_with_id() {
            match joined {
                Ok((worker, ())) => {
                    self.in_flight.remove(&worker);
                }
                Err(join_err) => {
                    let task = self.in_flight.remove(&join_err.id());
                    if let (Some(task), true) = (task, join_err.is_panic()) {
                        error!(task = %task, "worker panicked outside the task runner");
                        synthesized.push(RuntimeEvent::TaskCompleted {
                            task,
                            outcome: TaskOutcome::Failed("worker panicked".to_string()),
                        });
                    }
                }
            }
        }

        synthesized
    }

    /// Signal every worker to stop, and abort attempts still waiting for a
    /// slot or still inside their runner.
    pub fn shutdown(&mut self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        info!(in_flight = self.in_flight.len(), "shutting down worker pool");
        self.permits.close();
        self.workers.abort_all();
    }

    /// Wait for every worker to finish.
    pub async fn join(&mut self) {
        while let Some(joined) = self.workers.join_next_with_id().await {
            let worker = match &joined {
                Ok((worker, ())) => *worker,
                Err(join_err) => join_err.id(),
            };
            self.in_flight.remove(&worker);
        }
        debug!("worker pool drained");
    }
}
