// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::dag::{RunOutcome, ScheduledTask, Scheduler};
use crate::errors::{DagrunError, Result};
use crate::exec::{TaskRunner, WorkerPool};

use super::RuntimeEvent;

/// Whether the loop should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drives the scheduler in response to `RuntimeEvent`s and poll ticks, and
/// delegates attempts to a [`WorkerPool`].
///
/// The runtime is the only writer of the scheduler's state: workers never
/// touch it, they send completions over the event channel.
pub struct Runtime<'g, R: TaskRunner> {
    scheduler: Scheduler<'g>,
    pool: WorkerPool<R>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    tick: Duration,
}

impl<R: TaskRunner> fmt::Debug for Runtime<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("pool", &self.pool)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<'g, R: TaskRunner> Runtime<'g, R> {
    pub fn new(
        scheduler: Scheduler<'g>,
        pool: WorkerPool<R>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        tick: Duration,
    ) -> Self {
        Self {
            scheduler,
            pool,
            event_rx,
            tick,
        }
    }

    /// Build the event channel and pool around `runner`.
    ///
    /// The returned sender can be used to inject events such as
    /// [`RuntimeEvent::ShutdownRequested`].
    pub fn with_runner(
        scheduler: Scheduler<'g>,
        runner: R,
        pool_size: usize,
        tick: Duration,
    ) -> (Self, mpsc::Sender<RuntimeEvent>) {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(pool_size.max(1) * 2 + 16);
        let pool = WorkerPool::new(runner, pool_size, tx.clone());
        (Self::new(scheduler, pool, rx, tick), tx)
    }

    pub fn scheduler(&self) -> &Scheduler<'g> {
        &self.scheduler
    }

    /// Main loop.
    ///
    /// - Dispatches the ready frontier to the pool.
    /// - Applies completions as they arrive and re-dispatches right away.
    /// - Re-polls the frontier every tick.
    /// - Returns once nothing is running or left to dispatch and the pool is
    ///   drained.
    pub async fn run(mut self) -> Result<RunOutcome> {
        info!(
            pool_size = self.pool.size(),
            tick_ms = self.tick.as_millis() as u64,
            "runtime started"
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ready = self.scheduler.collect_ready();
        self.dispatch(ready);

        loop {
            for event in self.pool.reap() {
                if self.apply(event) == Flow::Stop {
                    return self.stop().await;
                }
            }

            if self.scheduler.is_finished() {
                break;
            }

            if self.scheduler.is_stalled() {
                error!(counts = ?self.scheduler.counts(), "no task can become ready");
                self.pool.shutdown();
                self.pool.join().await;
                return Err(DagrunError::Other(anyhow!(
                    "scheduler stalled with pending tasks and nothing running"
                )));
            }

            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        warn!("runtime event channel closed; exiting");
                        return self.stop().await;
                    };
                    debug!(?event, "runtime received event");
                    if self.apply(event) == Flow::Stop {
                        return self.stop().await;
                    }
                }
                _ = ticker.tick() => {
                    let ready = self.scheduler.collect_ready();
                    self.dispatch(ready);
                }
            }
        }

        self.pool.join().await;

        let counts = self.scheduler.counts();
        info!(
            done = counts.done,
            failed = counts.failed,
            "runtime finished"
        );
        Ok(self.scheduler.finish())
    }

    fn apply(&mut self, event: RuntimeEvent) -> Flow {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => {
                let step = self.scheduler.step_completion(task, outcome);
                if step.interrupted {
                    info!(
                        task = %self.scheduler.graph().name_of(task),
                        "task attempt interrupted; stopping the pool"
                    );
                    return Flow::Stop;
                }
                self.dispatch(step.newly_scheduled);
                Flow::Continue
            }
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested");
                Flow::Stop
            }
        }
    }

    fn dispatch(&mut self, tasks: Vec<ScheduledTask>) {
        if tasks.is_empty() {
            return;
        }
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "submitting ready tasks");

        for task in tasks {
            self.pool.submit(task);
        }
    }

    /// Shut the pool down and end the run.
    ///
    /// A run that already halted on a permanent failure still reports that
    /// failure, with the attempts cut short counted as pending. Otherwise
    /// the run ends as [`DagrunError::Interrupted`].
    async fn stop(mut self) -> Result<RunOutcome> {
        self.pool.shutdown();
        self.pool.join().await;

        // Completions sent before the pool went down still count.
        while let Ok(event) = self.event_rx.try_recv() {
            if let RuntimeEvent::TaskCompleted { task, outcome } = event {
                self.scheduler.step_completion(task, outcome);
            }
        }

        let counts = self.scheduler.counts();
        warn!(
            pending = counts.pending,
            running = counts.running,
            done = counts.done,
            failed = counts.failed,
            halted = self.scheduler.is_halted(),
            "runtime interrupted"
        );

        if self.scheduler.is_halted() {
            return Ok(self.scheduler.finish());
        }
        Err(DagrunError::Interrupted)
    }
}
