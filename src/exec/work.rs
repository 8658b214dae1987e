// src/exec/work.rs

//! User-supplied work units and the registry that constructs them.
//!
//! Work is looked up by the task's `kind` and built fresh from the task's
//! config for every attempt, so nothing an attempt does to its own state
//! is visible to the next one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use thiserror::Error;

use crate::exec::backend::ShutdownSignal;

/// Return this (or wrap it in an `anyhow::Error`) from [`Work::run`] to end
/// an attempt through cooperative cancellation rather than failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("task interrupted")]
pub struct Interrupted;

/// What a task does.
pub trait Work: Send {
    /// Perform the work. Any error marks the attempt as failed, except
    /// [`Interrupted`].
    fn run(&mut self, ctx: &TaskContext) -> anyhow::Result<()>;
}

/// Builds a fresh work instance from a task's config.
pub type WorkFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Box<dyn Work>> + Send + Sync>;

/// Per-attempt information handed to [`Work::run`].
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub name: String,
    pub attempt: u32,
    pub config: Value,
    shutdown: ShutdownSignal,
}

impl TaskContext {
    pub fn new(name: String, attempt: u32, config: Value, shutdown: ShutdownSignal) -> Self {
        Self {
            name,
            attempt,
            config,
            shutdown,
        }
    }

    /// Whether the pool is shutting down.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Bail out with [`Interrupted`] if the pool is shutting down.
    pub fn check_cancelled(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            Err(Interrupted.into())
        } else {
            Ok(())
        }
    }
}

struct FnWork<F>(Arc<F>);

impl<F> Work for FnWork<F>
where
    F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&mut self, ctx: &TaskContext) -> anyhow::Result<()> {
        (self.0)(ctx)
    }
}

/// Maps task kinds to work factories.
#[derive(Clone, Default)]
pub struct WorkRegistry {
    factories: HashMap<String, WorkFactory>,
}

impl fmt::Debug for WorkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("WorkRegistry").field("kinds", &kinds).finish()
    }
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory building a `W` from the task config. Replaces any
    /// previous registration for `kind`.
    pub fn register<W, F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        W: Work + 'static,
        F: Fn(&Value) -> anyhow::Result<W> + Send + Sync + 'static,
    {
        let factory: WorkFactory =
            Arc::new(move |config: &Value| -> anyhow::Result<Box<dyn Work>> {
                Ok(Box::new(factory(config)?))
            });
        self.factories.insert(kind.into(), factory);
        self
    }

    /// Register stateless work given as a closure.
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, work: F) -> &mut Self
    where
        F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        self.register(kind, move |_config: &Value| Ok(FnWork(Arc::clone(&work))))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a fresh work instance for one attempt.
    pub fn build(&self, kind: &str, config: &Value) -> anyhow::Result<Box<dyn Work>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| anyhow!("no work registered for task kind '{kind}'"))?;
        factory(config)
    }
}
