#![allow(dead_code)]

use std::time::Duration;

use dagrun::engine::RunOptions;

pub use dagrun_test_utils::*;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Options with a short tick and no persistence.
pub fn options(pool_size: usize) -> RunOptions {
    RunOptions {
        pool_size,
        tick: Duration::from_millis(10),
        run_id: None,
        default_retries: 0,
    }
}

/// Same as [`options`], persisting under `run_id`.
pub fn options_with_run_id(pool_size: usize, run_id: &str) -> RunOptions {
    RunOptions {
        run_id: Some(run_id.to_string()),
        ..options(pool_size)
    }
}
