// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::dag::{TaskGraph, TaskId, TaskSpec};
use crate::engine::RunOptions;
use crate::errors::{DagrunError, Result};
use crate::exec::task_runner::SHELL_KIND;

/// Raw configuration as read from a TOML pipeline file.
///
/// ```toml
/// [config]
/// pool_size = 4
/// tick = "500ms"
/// run_id = "nightly"
///
/// [task.crawl]
/// cmd = "./crawl.sh"
/// retries = 2
///
/// [task.extract]
/// cmd = "./extract.sh"
/// after = ["crawl"]
/// config = { shard = 3 }
/// ```
///
/// Not validated; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated pipeline file.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders know task
/// dependencies resolve and global settings are in range.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
    tick: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<String, TaskConfig>,
        tick: Duration,
    ) -> Self {
        Self { config, task, tick }
    }

    /// The parsed `[config].tick`.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Run options derived from `[config]`.
    pub fn run_options(&self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            pool_size: self.config.pool_size.unwrap_or(defaults.pool_size),
            tick: self.tick,
            run_id: self.config.run_id.clone(),
            default_retries: self.config.default_retries,
        }
    }

    /// Build the task graph: one `shell` task per `[task.<name>]`.
    pub fn to_graph(&self) -> Result<TaskGraph> {
        let mut graph = TaskGraph::new();
        for (name, task) in &self.task {
            graph.add_task(task.to_spec(name)?)?;
        }
        for (name, task) in &self.task {
            let id = lookup(&graph, name)?;
            for dep in &task.after {
                graph.add_dependency(id, lookup(&graph, dep)?)?;
            }
        }
        Ok(graph)
    }
}

fn lookup(graph: &TaskGraph, name: &str) -> Result<TaskId> {
    graph
        .id_of(name)
        .ok_or_else(|| DagrunError::TaskNotFound(name.to_string()))
}

/// `[config]` section. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Concurrent attempts. `None` means available parallelism.
    #[serde(default)]
    pub pool_size: Option<usize>,

    /// Poll interval of the runtime loop, e.g. `"250ms"` or `"1s"`.
    #[serde(default = "default_tick")]
    pub tick: String,

    /// Key for resume snapshots; empty disables persistence.
    #[serde(default)]
    pub run_id: Option<String>,

    /// Directory holding resume snapshots.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Retries for tasks that do not set `retries`.
    #[serde(default)]
    pub default_retries: u32,
}

fn default_tick() -> String {
    "1s".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".dagrun")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            pool_size: None,
            tick: default_tick(),
            run_id: None,
            state_dir: default_state_dir(),
            default_retries: 0,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command line.
    pub cmd: String,

    /// This task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Retry budget; falls back to `[config].default_retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Free-form table exported to the command as `DAGRUN_CONFIG` (JSON).
    #[serde(default)]
    pub config: Option<toml::Table>,
}

impl TaskConfig {
    /// The task config as JSON, with `cmd` merged in.
    pub fn payload(&self) -> Result<Value> {
        let mut payload = match &self.config {
            Some(table) => serde_json::to_value(table)?,
            None => Value::Object(serde_json::Map::new()),
        };
        if let Value::Object(map) = &mut payload {
            map.insert("cmd".to_string(), Value::String(self.cmd.clone()));
        }
        Ok(payload)
    }

    pub fn to_spec(&self, name: &str) -> Result<TaskSpec> {
        let mut spec = TaskSpec::new(name, SHELL_KIND).with_config(self.payload()?);
        spec.retries = self.retries;
        Ok(spec)
    }
}
