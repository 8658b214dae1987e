// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dagrun`.
///
/// Flags override the matching `[config]` values of the pipeline file.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a pipeline of dependent tasks with bounded parallelism, retries and resume.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Dagrun.toml")]
    pub config: PathBuf,

    /// Root task to run, together with everything it depends on.
    ///
    /// May be repeated. Default: every task nothing else depends on.
    #[arg(long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Maximum number of tasks running at once.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub pool_size: Option<u64>,

    /// Scheduler poll interval, e.g. `500ms` or `2s`.
    #[arg(long, value_name = "DURATION")]
    pub tick: Option<String>,

    /// Persist failures under this id and resume from them on the next run.
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,

    /// Directory for resume snapshots.
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
