// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] holds the arena of task nodes and their dependency lists.
//! - [`task_info`] provides task handles, specs and scheduled attempts.
//! - [`cycle`] rejects cyclic graphs before anything runs.
//! - [`expand`] computes the tasks reachable from the roots.
//! - [`run_state`] owns the pending/running/done/failed sets.
//! - [`retry`] tracks per-run retry budgets.
//! - [`failure`] aggregates the first permanent failure of a run.
//! - [`scheduler`] is the per-run state machine tying these together.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod cycle;
pub mod expand;
pub mod failure;
pub mod graph;
pub mod retry;
pub mod run_state;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_info;

pub use failure::FailureRecord;
pub use graph::TaskGraph;
pub use run_state::{RunCounts, TaskRunState};
pub use scheduler::{RunOutcome, Scheduler};
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskId, TaskSpec};
