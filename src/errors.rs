// src/errors.rs

//! Crate-wide error types.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error(transparent)]
    CircularDependency(#[from] CycleError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Failed(#[from] SchedulerFailure),

    #[error("Run interrupted before completion")]
    Interrupted,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A dependency cycle, as the sequence of task names from the first
/// occurrence of the repeated task through its repetition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency: {}", .path.join(" -> "))]
pub struct CycleError {
    pub path: Vec<String>,
}

/// Run-level failure: at least one task exhausted its retries.
///
/// The three sets partition every task discovered for the run. Re-submitting
/// `pending ∪ failed` as roots while treating `done` as satisfied resumes the
/// run; this is what a run id automates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct SchedulerFailure {
    /// Tasks that never got a chance because an unrelated task failed.
    pub pending: BTreeSet<String>,
    pub done: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl fmt::Display for SchedulerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&str> = self.failed.iter().map(String::as_str).collect();
        write!(
            f,
            "SchedulerFailure\n- pending tasks: {}\n- done tasks: {}\n- failed tasks: {}",
            self.pending.len(),
            self.done.len(),
            failed.join(", ")
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;
