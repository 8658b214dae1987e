// src/snapshot/mod.rs

//! Resume snapshots.
//!
//! When a run with a run id fails, the three task sets are persisted by
//! name together with a [`TaskRecord`] for every task involved. A later run
//! with the same id rebuilds the graph from those records, re-submits
//! `pending ∪ failed` as roots and treats `done` as already satisfied.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dag::{FailureRecord, TaskGraph, TaskId, TaskSpec};
use crate::errors::{DagrunError, Result};

pub mod file;

pub use file::FileSnapshotStore;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Enough of a task to rebuild it in a fresh process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Value,
    /// Names of direct dependencies.
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// Durable form of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub run_id: String,
    pub pending: BTreeSet<String>,
    pub done: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub tasks: Vec<TaskRecord>,
}

/// A graph rebuilt from a snapshot, ready to hand to the scheduler.
#[derive(Debug, Clone)]
pub struct ResumePlan {
    pub graph: TaskGraph,
    pub roots: Vec<TaskId>,
    pub done: BTreeSet<TaskId>,
}

impl Snapshot {
    /// Capture a failure record of `graph` under `run_id`.
    pub fn from_record(graph: &TaskGraph, run_id: &str, record: &FailureRecord) -> Self {
        let names = |set: &BTreeSet<TaskId>| set.iter().map(|id| graph.name_of(*id)).collect();

        let tasks = record
            .all_tasks()
            .into_iter()
            .filter_map(|id| {
                let spec = graph.spec(id)?;
                Some(TaskRecord {
                    name: spec.name.clone(),
                    kind: spec.kind.clone(),
                    config: spec.config.clone(),
                    deps: graph
                        .dependencies_of(id)
                        .iter()
                        .map(|dep| graph.name_of(*dep))
                        .collect(),
                    retries: spec.retries,
                })
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            run_id: run_id.to_string(),
            pending: names(&record.pending),
            done: names(&record.done),
            failed: names(&record.failed),
            tasks,
        }
    }

    /// Rebuild the recorded graph and resolve the task sets to handles.
    pub fn rebuild(&self) -> Result<ResumePlan> {
        if self.version != SNAPSHOT_VERSION {
            return Err(DagrunError::Snapshot(format!(
                "snapshot '{}' has version {}, expected {}",
                self.run_id, self.version, SNAPSHOT_VERSION
            )));
        }

        let mut graph = TaskGraph::new();
        for record in &self.tasks {
            let mut spec =
                TaskSpec::new(record.name.clone(), record.kind.clone()).with_config(record.config.clone());
            spec.retries = record.retries;
            graph.add_task(spec)?;
        }

        // Wire edges once every node exists; records may come in any order.
        for record in &self.tasks {
            let task = self.resolve(&graph, &record.name)?;
            for dep in &record.deps {
                let dep = self.resolve(&graph, dep)?;
                graph.add_dependency(task, dep)?;
            }
        }

        let roots = self
            .pending
            .iter()
            .chain(&self.failed)
            .map(|name| self.resolve(&graph, name))
            .collect::<Result<Vec<_>>>()?;
        let done = self
            .done
            .iter()
            .map(|name| self.resolve(&graph, name))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(ResumePlan { graph, roots, done })
    }

    fn resolve(&self, graph: &TaskGraph, name: &str) -> Result<TaskId> {
        graph.id_of(name).ok_or_else(|| {
            DagrunError::Snapshot(format!(
                "snapshot '{}' references unknown task '{}'",
                self.run_id, name
            ))
        })
    }
}

/// Where snapshots live. Keyed by run id.
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing any previous one for the same run id.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    fn load(&self, run_id: &str) -> Result<Option<Snapshot>>;

    /// Remove the snapshot for `run_id`. A missing snapshot is not an error.
    fn delete(&self, run_id: &str) -> Result<()>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<S> {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).save(snapshot)
    }

    fn load(&self, run_id: &str) -> Result<Option<Snapshot>> {
        (**self).load(run_id)
    }

    fn delete(&self, run_id: &str) -> Result<()> {
        (**self).delete(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// fetch <- parse <- report, plus an unrelated `lint`.
    fn pipeline() -> (TaskGraph, [TaskId; 4]) {
        let mut graph = TaskGraph::new();
        let fetch = graph
            .add_task(TaskSpec::new("fetch", "shell").with_config(json!({ "cmd": "true" })))
            .unwrap();
        let parse = graph
            .add_task_with_deps(TaskSpec::new("parse", "shell").with_retries(2), &[fetch])
            .unwrap();
        let report = graph
            .add_task_with_deps(TaskSpec::new("report", "shell"), &[parse])
            .unwrap();
        let lint = graph.add_task(TaskSpec::new("lint", "shell")).unwrap();
        (graph, [fetch, parse, report, lint])
    }

    #[test]
    fn rebuild_restores_graph_and_roots() {
        let (graph, [fetch, parse, report, lint]) = pipeline();
        let record = FailureRecord {
            pending: [report].into_iter().collect(),
            done: [fetch, lint].into_iter().collect(),
            failed: [parse].into_iter().collect(),
        };

        let snapshot = Snapshot::from_record(&graph, "nightly", &record);
        assert_eq!(snapshot.tasks.len(), 4);

        let text = serde_json::to_string_pretty(&snapshot).unwrap();
        let loaded: Snapshot = serde_json::from_str(&text).unwrap();
        let plan = loaded.rebuild().unwrap();

        let name = |id: TaskId| plan.graph.name_of(id);
        let mut roots: Vec<String> = plan.roots.iter().map(|id| name(*id)).collect();
        roots.sort();
        assert_eq!(roots, ["parse", "report"]);

        let done: BTreeSet<String> = plan.done.iter().map(|id| name(*id)).collect();
        assert_eq!(done, ["fetch", "lint"].into_iter().map(String::from).collect());

        let parse = plan.graph.id_of("parse").unwrap();
        let fetch = plan.graph.id_of("fetch").unwrap();
        assert_eq!(plan.graph.dependencies_of(parse), &[fetch]);
        assert_eq!(plan.graph.spec(parse).unwrap().retries, Some(2));
        assert_eq!(plan.graph.spec(fetch).unwrap().config, json!({ "cmd": "true" }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            run_id: "r".into(),
            pending: ["a".to_string()].into_iter().collect(),
            done: BTreeSet::new(),
            failed: BTreeSet::new(),
            tasks: vec![TaskRecord {
                name: "a".into(),
                kind: "shell".into(),
                config: Value::Null,
                deps: vec!["ghost".into()],
                retries: None,
            }],
        };
        let err = snapshot.rebuild().unwrap_err();
        assert!(matches!(err, DagrunError::Snapshot(msg) if msg.contains("ghost")));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let (graph, _) = pipeline();
        let mut snapshot = Snapshot::from_record(&graph, "r", &FailureRecord::default());
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(matches!(snapshot.rebuild(), Err(DagrunError::Snapshot(_))));
    }
}
