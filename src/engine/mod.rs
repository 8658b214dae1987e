// src/engine/mod.rs

//! Orchestration engine for dagrun.
//!
//! This module ties together:
//! - the pure DAG scheduler
//! - the worker pool executing task attempts
//! - the runtime event loop that reacts to task completions, poll ticks
//!   and shutdown requests
//! - resume snapshots keyed by run id
//!
//! The async loop lives in [`runtime`]; [`entry`] wires validation, resume
//! and persistence around it.

use std::time::Duration;

use crate::dag::TaskId;

/// Outcome of one task attempt, as reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The work returned an error, panicked or exited unsuccessfully.
    Failed(String),
    /// The attempt was cancelled cooperatively. Not a failure.
    Interrupted,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Events flowing into the runtime from workers and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task attempt finished with a concrete outcome.
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Knobs for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of concurrently executing attempts.
    pub pool_size: usize,
    /// Poll interval of the runtime loop.
    pub tick: Duration,
    /// Key for resume snapshots. `None` or empty disables persistence.
    pub run_id: Option<String>,
    /// Retry budget for tasks that do not set their own.
    pub default_retries: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            tick: Duration::from_secs(1),
            run_id: None,
            default_retries: 0,
        }
    }
}

impl RunOptions {
    /// The run id, if persistence is enabled.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Available parallelism, or 1 if it cannot be determined.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Result of a run that finished without permanent failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Names of all done tasks, including ones carried over from a snapshot.
    pub done: std::collections::BTreeSet<String>,
    /// Whether the run was seeded from a resume snapshot.
    pub resumed: bool,
}

pub mod entry;
pub mod runtime;

pub use entry::{run_tasks, run_tasks_until};
pub use runtime::Runtime;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_run_id_disables_persistence() {
        let mut options = RunOptions::default();
        assert_eq!(options.run_id(), None);

        options.run_id = Some(String::new());
        assert_eq!(options.run_id(), None);

        options.run_id = Some("nightly".into());
        assert_eq!(options.run_id(), Some("nightly"));
    }

    #[test]
    fn default_pool_is_never_empty() {
        assert!(RunOptions::default().pool_size >= 1);
    }
}
