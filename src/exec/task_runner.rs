// src/exec/task_runner.rs

//! Runs `shell` tasks as child processes.
//!
//! The task's `config.cmd` is executed through the platform shell. The
//! child gets the task name, attempt number and the full JSON config in
//! its environment, so the work runs with no memory shared with the
//! scheduler. stdout is logged at info, stderr at debug.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::backend::{ShutdownSignal, TaskRunner, shutdown_requested};

/// Task kind handled by [`CommandRunner`].
pub const SHELL_KIND: &str = "shell";

pub const ENV_TASK: &str = "DAGRUN_TASK";
pub const ENV_ATTEMPT: &str = "DAGRUN_ATTEMPT";
pub const ENV_CONFIG: &str = "DAGRUN_CONFIG";

#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for CommandRunner {
    fn run(
        &self,
        task: ScheduledTask,
        shutdown: ShutdownSignal,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(run_task(task, shutdown))
    }
}

/// Run a single task process and map its exit into a [`TaskOutcome`].
///
/// If the shutdown signal fires, the child is killed and the attempt is
/// reported as interrupted rather than failed.
pub async fn run_task(task: ScheduledTask, shutdown: ShutdownSignal) -> TaskOutcome {
    let task_name = task.name.clone();
    let attempt = task.attempt;
    match run_task_inner(task, shutdown).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                task = %task_name,
                attempt,
                error = %format!("{err:#}"),
                "task execution error"
            );
            TaskOutcome::Failed(format!("{err:#}"))
        }
    }
}

/// The command line of a shell task.
pub fn command_of(task: &ScheduledTask) -> Result<&str> {
    task.config
        .get("cmd")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("task '{}' has no string `cmd` in its config", task.name))
}

async fn run_task_inner(task: ScheduledTask, mut shutdown: ShutdownSignal) -> Result<TaskOutcome> {
    if task.kind != SHELL_KIND {
        return Err(anyhow!(
            "task '{}' has kind '{}', expected '{}'",
            task.name,
            task.kind,
            SHELL_KIND
        ));
    }

    let line = command_of(&task)?;
    info!(
        task = %task.name,
        attempt = task.attempt,
        cmd = %line,
        "starting task process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    };

    let config_json = serde_json::to_string(&task.config)
        .with_context(|| format!("serializing config of task '{}'", task.name))?;

    cmd.env(ENV_TASK, &task.name)
        .env(ENV_ATTEMPT, task.attempt.to_string())
        .env(ENV_CONFIG, config_json)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.name))?;

    if let Some(stdout) = child.stdout.take() {
        let task_name = task.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %task_name, "stdout: {}", line);
            }
        });
    }

    // Always consume stderr so buffers don't fill.
    if let Some(stderr) = child.stderr.take() {
        let task_name = task.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", task.name)
            })?;

            info!(
                task = %task.name,
                attempt = task.attempt,
                exit_code = ?status.code(),
                success = status.success(),
                "task process exited"
            );

            if status.success() {
                Ok(TaskOutcome::Success)
            } else if killed_by_interrupt(&status) {
                Ok(TaskOutcome::Interrupted)
            } else {
                Ok(TaskOutcome::Failed(format!("process exited with {status}")))
            }
        }

        _ = shutdown_requested(&mut shutdown) => {
            info!(
                task = %task.name,
                attempt = task.attempt,
                "shutdown requested; killing task process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    task = %task.name,
                    error = %e,
                    "failed to kill child process on shutdown"
                );
            }
            Ok(TaskOutcome::Interrupted)
        }
    }
}

#[cfg(unix)]
fn killed_by_interrupt(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    const SIGINT: i32 = 2;
    status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: &std::process::ExitStatus) -> bool {
    false
}
