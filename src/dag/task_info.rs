// src/dag/task_info.rs

//! Task nodes and the per-attempt descriptors handed to workers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable handle of a task inside a [`TaskGraph`](crate::dag::TaskGraph).
///
/// Handles are the task identity: two handles are equal iff they refer to
/// the same node of the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable description of a unit of work.
///
/// The scheduler never mutates a spec; remaining retries are tracked in the
/// run state so the same graph can be run (or resumed) any number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique name within the graph. Used in reports and snapshots.
    pub name: String,
    /// Selects the work implementation (`"shell"` for commands, or a kind
    /// registered in a [`WorkRegistry`](crate::exec::WorkRegistry)).
    pub kind: String,
    /// Opaque payload handed to the work on every attempt.
    #[serde(default)]
    pub config: Value,
    /// Retry budget; `None` uses the run default.
    #[serde(default)]
    pub retries: Option<u32>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            config: Value::Null,
            retries: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Description of a single attempt the scheduler wants a worker to run now.
///
/// Owns copies of everything a worker needs so it can cross into a spawned
/// task, a blocking thread or a child process.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: String,
    pub kind: String,
    pub config: Value,
    /// 1-based attempt number for this run.
    pub attempt: u32,
}

impl ScheduledTask {
    pub fn from_spec(id: TaskId, spec: &TaskSpec, attempt: u32) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            config: spec.config.clone(),
            attempt,
        }
    }
}
