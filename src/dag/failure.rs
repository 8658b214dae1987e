// src/dag/failure.rs

//! Failure aggregation: what a run looked like when it stopped.

use std::collections::BTreeSet;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;
use crate::errors::SchedulerFailure;

/// Snapshot of a failed run once all in-flight work drained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailureRecord {
    pub pending: BTreeSet<TaskId>,
    pub done: BTreeSet<TaskId>,
    pub failed: BTreeSet<TaskId>,
}

impl FailureRecord {
    /// Every task the record accounts for.
    pub fn all_tasks(&self) -> BTreeSet<TaskId> {
        self.pending
            .iter()
            .chain(&self.done)
            .chain(&self.failed)
            .copied()
            .collect()
    }

    /// Name-keyed view for callers, who do not hold our handles.
    pub fn to_failure(&self, graph: &TaskGraph) -> SchedulerFailure {
        let names = |set: &BTreeSet<TaskId>| set.iter().map(|id| graph.name_of(*id)).collect();
        SchedulerFailure {
            pending: names(&self.pending),
            done: names(&self.done),
            failed: names(&self.failed),
        }
    }
}

/// Tracks the first permanent failure of a run.
///
/// The `pending` set captured on the first failure wins; later failures
/// only add to `failed`.
#[derive(Debug, Clone, Default)]
pub struct FailureAggregator {
    halted: bool,
    pending_at_halt: BTreeSet<TaskId>,
}

impl FailureAggregator {
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Record a permanent failure. Returns `true` if this one halted the run,
    /// in which case `pending` has been moved into the aggregator.
    pub fn on_permanent_failure(&mut self, pending: &mut BTreeSet<TaskId>) -> bool {
        if self.halted {
            return false;
        }
        self.halted = true;
        self.pending_at_halt = std::mem::take(pending);
        true
    }

    /// Tasks that were pending when the run halted.
    pub fn pending(&self) -> BTreeSet<TaskId> {
        self.pending_at_halt.clone()
    }
}
