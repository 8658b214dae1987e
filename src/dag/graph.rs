// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::task_info::{TaskId, TaskSpec};
use crate::errors::{DagrunError, Result};

/// Internal node structure: the task spec plus its immediate dependencies.
#[derive(Debug, Clone)]
struct TaskNode {
    spec: TaskSpec,
    /// Direct dependencies: tasks that must be done before this one can run.
    deps: Vec<TaskId>,
}

/// Arena of task nodes addressed by [`TaskId`].
///
/// Dependencies may be wired in any order before a run, so cycles are
/// representable here; they are rejected by [`crate::dag::cycle`] before
/// anything is dispatched.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    by_name: HashMap<String, TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with no dependencies.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskId> {
        if self.by_name.contains_key(&spec.name) {
            return Err(DagrunError::DuplicateTask(spec.name));
        }
        let id = TaskId(self.nodes.len());
        self.by_name.insert(spec.name.clone(), id);
        self.nodes.push(TaskNode {
            spec,
            deps: Vec::new(),
        });
        Ok(id)
    }

    /// Add a task depending on `deps`, in order.
    pub fn add_task_with_deps(&mut self, spec: TaskSpec, deps: &[TaskId]) -> Result<TaskId> {
        for dep in deps {
            self.check(*dep)?;
        }
        let id = self.add_task(spec)?;
        self.nodes[id.0].deps.extend_from_slice(deps);
        Ok(id)
    }

    /// Make `task` depend on `dep`. Duplicate edges are ignored.
    pub fn add_dependency(&mut self, task: TaskId, dep: TaskId) -> Result<()> {
        self.check(task)?;
        self.check(dep)?;
        let deps = &mut self.nodes[task.0].deps;
        if !deps.contains(&dep) {
            deps.push(dep);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        id.0 < self.nodes.len()
    }

    /// All task handles, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.nodes.len()).map(TaskId)
    }

    pub fn spec(&self, id: TaskId) -> Option<&TaskSpec> {
        self.nodes.get(id.0).map(|n| &n.spec)
    }

    /// Name of a task, or its handle rendered as `#n` if unknown.
    pub fn name_of(&self, id: TaskId) -> String {
        self.spec(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn id_of(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).copied()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(id.0)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that no other task depends on.
    pub fn sinks(&self) -> Vec<TaskId> {
        let mut has_dependent = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for dep in &node.deps {
                has_dependent[dep.0] = true;
            }
        }
        self.ids().filter(|id| !has_dependent[id.0]).collect()
    }

    /// Dependencies-first ordering of the given tasks' induced subgraph.
    ///
    /// Used for dry-run plans; returns the offending task if the subgraph is
    /// cyclic.
    pub fn topological_order(&self, tasks: impl IntoIterator<Item = TaskId>) -> Result<Vec<TaskId>> {
        let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
        let tasks: Vec<TaskId> = tasks.into_iter().collect();

        for id in &tasks {
            graph.add_node(*id);
        }
        // Edge direction: dep -> task.
        for id in &tasks {
            for dep in self.dependencies_of(*id) {
                if graph.contains_node(*dep) {
                    graph.add_edge(*dep, *id, ());
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            DagrunError::ConfigError(format!(
                "cycle detected in task graph involving task '{}'",
                self.name_of(cycle.node_id())
            ))
        })
    }

    fn check(&self, id: TaskId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(DagrunError::TaskNotFound(id.to_string()))
        }
    }
}
