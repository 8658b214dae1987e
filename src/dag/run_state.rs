// src/dag/run_state.rs

//! Per-run task sets and their transitions.

use std::collections::BTreeSet;

use tracing::warn;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;

/// Where a task currently sits in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task was not discovered for this run.
    NotInRun,
    Pending,
    Running,
    Done,
    Failed,
}

/// Counts for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}

/// The four disjoint task sets of a run.
///
/// Every transition removes a task from exactly one set before inserting it
/// into another, so the union always equals the discovered task set.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pending: BTreeSet<TaskId>,
    running: BTreeSet<TaskId>,
    done: BTreeSet<TaskId>,
    failed: BTreeSet<TaskId>,
}

impl RunState {
    /// Start a run where `tasks` still have to execute and `done` is already
    /// satisfied. Tasks present in both are treated as done.
    pub fn new(tasks: BTreeSet<TaskId>, done: BTreeSet<TaskId>) -> Self {
        let pending = tasks.difference(&done).copied().collect();
        Self {
            pending,
            running: BTreeSet::new(),
            done,
            failed: BTreeSet::new(),
        }
    }

    pub fn state_of(&self, task: TaskId) -> TaskRunState {
        if self.pending.contains(&task) {
            TaskRunState::Pending
        } else if self.running.contains(&task) {
            TaskRunState::Running
        } else if self.done.contains(&task) {
            TaskRunState::Done
        } else if self.failed.contains(&task) {
            TaskRunState::Failed
        } else {
            TaskRunState::NotInRun
        }
    }

    pub fn pending(&self) -> &BTreeSet<TaskId> {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut BTreeSet<TaskId> {
        &mut self.pending
    }

    pub fn running(&self) -> &BTreeSet<TaskId> {
        &self.running
    }

    pub fn done(&self) -> &BTreeSet<TaskId> {
        &self.done
    }

    pub fn failed(&self) -> &BTreeSet<TaskId> {
        &self.failed
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            pending: self.pending.len(),
            running: self.running.len(),
            done: self.done.len(),
            failed: self.failed.len(),
        }
    }

    /// Whether every direct dependency of `task` is done.
    pub fn deps_satisfied(&self, graph: &TaskGraph, task: TaskId) -> bool {
        graph
            .dependencies_of(task)
            .iter()
            .all(|dep| self.done.contains(dep))
    }

    /// Pending tasks whose direct dependencies are all done.
    pub fn ready_frontier(&self, graph: &TaskGraph) -> Vec<TaskId> {
        self.pending
            .iter()
            .copied()
            .filter(|task| self.deps_satisfied(graph, *task))
            .collect()
    }

    pub fn mark_running(&mut self, task: TaskId) -> bool {
        self.transition(task, TaskRunState::Pending, TaskRunState::Running)
    }

    pub fn mark_done(&mut self, task: TaskId) -> bool {
        self.transition(task, TaskRunState::Running, TaskRunState::Done)
    }

    pub fn mark_failed(&mut self, task: TaskId) -> bool {
        self.transition(task, TaskRunState::Running, TaskRunState::Failed)
    }

    /// Running task goes back to `pending` for another attempt.
    pub fn requeue(&mut self, task: TaskId) -> bool {
        self.transition(task, TaskRunState::Running, TaskRunState::Pending)
    }

    fn transition(&mut self, task: TaskId, from: TaskRunState, to: TaskRunState) -> bool {
        let removed = match from {
            TaskRunState::Pending => self.pending.remove(&task),
            TaskRunState::Running => self.running.remove(&task),
            TaskRunState::Done => self.done.remove(&task),
            TaskRunState::Failed => self.failed.remove(&task),
            TaskRunState::NotInRun => false,
        };

        if !removed {
            warn!(
                task = %task,
                from = ?from,
                to = ?to,
                actual = ?self.state_of(task),
                "invalid task transition; ignoring"
            );
            return false;
        }

        match to {
            TaskRunState::Pending => self.pending.insert(task),
            TaskRunState::Running => self.running.insert(task),
            TaskRunState::Done => self.done.insert(task),
            TaskRunState::Failed => self.failed.insert(task),
            TaskRunState::NotInRun => false,
        };
        true
    }
}
