// src/exec/mod.rs

//! Task execution layer.
//!
//! The engine hands each attempt to a [`WorkerPool`], which bounds
//! concurrency and reports outcomes back as `RuntimeEvent`s.
//!
//! - [`backend`] defines the [`TaskRunner`] trait the pool talks to, so
//!   tests can swap in a fake runner.
//! - [`pool`] owns the semaphore-bounded set of worker tasks.
//! - [`in_process`] runs registered [`Work`] on the blocking thread pool.
//! - [`task_runner`] runs `shell` tasks as child processes.
//! - [`work`] holds the `Work` trait and the kind → factory registry.

pub mod backend;
pub mod in_process;
pub mod pool;
pub mod task_runner;
pub mod work;

pub use backend::{ShutdownSignal, TaskRunner};
pub use in_process::InProcessRunner;
pub use pool::WorkerPool;
pub use task_runner::CommandRunner;
pub use work::{Interrupted, TaskContext, Work, WorkFactory, WorkRegistry};
