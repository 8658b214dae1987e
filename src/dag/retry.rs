// src/dag/retry.rs

//! Per-run retry budgets.
//!
//! Budgets are seeded from each task's spec (or the run default) and live
//! only for the duration of one run, so task specs stay immutable.

use std::collections::HashMap;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;

/// What to do with a task whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back into `pending`; `remaining` retries are left after
    /// this one.
    Retry { remaining: u32 },
    /// Budget exhausted: the failure is permanent.
    Exhausted,
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    remaining: HashMap<TaskId, u32>,
}

impl RetryPolicy {
    /// Seed budgets for `tasks` from the graph, falling back to `default`.
    pub fn seed(graph: &TaskGraph, tasks: impl IntoIterator<Item = TaskId>, default: u32) -> Self {
        let remaining = tasks
            .into_iter()
            .map(|id| {
                let budget = graph.spec(id).and_then(|s| s.retries).unwrap_or(default);
                (id, budget)
            })
            .collect();
        Self { remaining }
    }

    pub fn remaining(&self, task: TaskId) -> u32 {
        self.remaining.get(&task).copied().unwrap_or(0)
    }

    /// Consume one retry if any is left.
    pub fn on_failure(&mut self, task: TaskId) -> RetryDecision {
        match self.remaining.get_mut(&task) {
            Some(left) if *left > 0 => {
                *left -= 1;
                RetryDecision::Retry { remaining: *left }
            }
            _ => RetryDecision::Exhausted,
        }
    }
}
