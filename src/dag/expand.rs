// src/dag/expand.rs

use std::collections::BTreeSet;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;

/// Roots plus every task they transitively depend on.
pub fn expand_roots(graph: &TaskGraph, roots: &[TaskId]) -> BTreeSet<TaskId> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<TaskId> = roots.to_vec();

    while let Some(task) = stack.pop() {
        if !seen.insert(task) {
            continue;
        }
        stack.extend(graph.dependencies_of(task).iter().copied());
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task_info::TaskSpec;

    #[test]
    fn shared_dependencies_appear_once() {
        let mut graph = TaskGraph::new();
        let c = graph.add_task(TaskSpec::new("c", "noop")).unwrap();
        let b = graph.add_task_with_deps(TaskSpec::new("b", "noop"), &[c]).unwrap();
        let d = graph.add_task_with_deps(TaskSpec::new("d", "noop"), &[c]).unwrap();
        let a = graph.add_task_with_deps(TaskSpec::new("a", "noop"), &[b, d]).unwrap();
        let _unrelated = graph.add_task(TaskSpec::new("x", "noop")).unwrap();

        let all = expand_roots(&graph, &[a, d]);
        assert_eq!(all, [a, b, c, d].into_iter().collect());
    }
}
