// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The worker pool talks to a `TaskRunner` instead of executing work
//! directly. This makes it easy to swap in a fake runner in tests while
//! keeping the production runners in [`super::in_process`] and
//! [`super::task_runner`].
//!
//! A runner must never propagate an error out of `run`: every problem with
//! an attempt is reported as [`TaskOutcome::Failed`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;

/// Receiver side of the pool's shutdown signal. Flips to `true` once.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Trait abstracting how a single task attempt is executed.
pub trait TaskRunner: Send + Sync + 'static {
    /// Run one attempt to completion and report its outcome.
    ///
    /// Implementations should watch `shutdown` and return
    /// [`TaskOutcome::Interrupted`] when it fires.
    fn run(
        &self,
        task: ScheduledTask,
        shutdown: ShutdownSignal,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>>;
}

impl<R: TaskRunner + ?Sized> TaskRunner for Arc<R> {
    fn run(
        &self,
        task: ScheduledTask,
        shutdown: ShutdownSignal,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        (**self).run(task, shutdown)
    }
}

/// Resolve once shutdown has been requested.
///
/// Never resolves if the sending side is gone without having signalled.
pub async fn shutdown_requested(signal: &mut ShutdownSignal) {
    let closed = signal.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
