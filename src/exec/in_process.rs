// src/exec/in_process.rs

//! Runs registered work on Tokio's blocking thread pool.
//!
//! Every attempt gets a freshly built work instance on its own thread. A
//! panic in the work is caught at the thread boundary and reported as a
//! failure; it never reaches the scheduler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::backend::{ShutdownSignal, TaskRunner};
use crate::exec::work::{Interrupted, TaskContext, WorkRegistry};

#[derive(Debug, Clone)]
pub struct InProcessRunner {
    registry: Arc<WorkRegistry>,
}

impl InProcessRunner {
    pub fn new(registry: WorkRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &WorkRegistry {
        &self.registry
    }
}

impl TaskRunner for InProcessRunner {
    fn run(
        &self,
        task: ScheduledTask,
        shutdown: ShutdownSignal,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        let registry = Arc::clone(&self.registry);

        Box::pin(async move {
            let name = task.name.clone();
            let attempt = task.attempt;
            debug!(task = %name, attempt, "starting in-process attempt");

            let joined = tokio::task::spawn_blocking(move || {
                let ctx = TaskContext::new(task.name, task.attempt, task.config, shutdown);
                let mut work = registry.build(&task.kind, &ctx.config)?;
                work.run(&ctx)
            })
            .await;

            match joined {
                Ok(Ok(())) => TaskOutcome::Success,
                Ok(Err(err)) if err.is::<Interrupted>() => {
                    info!(task = %name, attempt, "work interrupted");
                    TaskOutcome::Interrupted
                }
                Ok(Err(err)) => {
                    error!(task = %name, attempt, error = ?err, "work returned an error");
                    TaskOutcome::Failed(format!("{err:#}"))
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(task = %name, attempt, "work panicked");
                    TaskOutcome::Failed(format!("task '{name}' panicked"))
                }
                Err(join_err) => {
                    debug!(task = %name, attempt, error = %join_err, "work cancelled");
                    TaskOutcome::Interrupted
                }
            }
        })
    }
}
