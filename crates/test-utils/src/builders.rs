use std::collections::BTreeSet;

use dagrun::dag::{TaskGraph, TaskId, TaskSpec};

/// Task kind used by graphs built here.
pub const TEST_KIND: &str = "test";

/// Builder for `TaskGraph` keyed by task names.
///
/// ```ignore
/// // C <- B <- A
/// let graph = GraphBuilder::new().task("C").task("B").task("A")
///     .dep("A", "B").dep("B", "C").build();
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: TaskGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(self, name: &str) -> Self {
        self.spec(TaskSpec::new(name, TEST_KIND))
    }

    pub fn task_with_retries(self, name: &str, retries: u32) -> Self {
        self.spec(TaskSpec::new(name, TEST_KIND).with_retries(retries))
    }

    pub fn spec(mut self, spec: TaskSpec) -> Self {
        self.graph.add_task(spec).expect("duplicate task in builder");
        self
    }

    /// `task` depends on `dep`. Both must already be added.
    pub fn dep(mut self, task: &str, dep: &str) -> Self {
        let task = self.id(task);
        let dep = self.id(dep);
        self.graph.add_dependency(task, dep).expect("unknown task in builder");
        self
    }

    pub fn build(self) -> TaskGraph {
        self.graph
    }

    fn id(&self, name: &str) -> TaskId {
        self.graph
            .id_of(name)
            .unwrap_or_else(|| panic!("task '{name}' not added to builder"))
    }
}

/// Resolve task names to handles, panicking on unknown names.
pub fn ids(graph: &TaskGraph, names: &[&str]) -> Vec<TaskId> {
    names
        .iter()
        .map(|name| {
            graph
                .id_of(name)
                .unwrap_or_else(|| panic!("unknown task '{name}'"))
        })
        .collect()
}

/// Name set for assertions against `SchedulerFailure` and `RunSummary`.
pub fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
