// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::{ScheduledTask, TaskId};

/// Structured result of applying a single completion.
///
/// This is useful for tests that want to manually step the scheduler and
/// make assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready (and were marked running) by this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Task that was re-queued for another attempt.
    pub retried: Option<TaskId>,
    /// Task that failed permanently in this step.
    pub newly_failed: Option<TaskId>,
    /// Whether this step halted dispatch (first permanent failure).
    pub halted: bool,
    /// Whether the attempt ended through cooperative cancellation.
    pub interrupted: bool,
    /// Whether nothing is pending or running any more.
    pub run_just_finished: bool,
}
