// src/dag/cycle.rs

//! Cycle detection over the part of the graph reachable from the roots.
//!
//! Each root is walked depth-first with its own path, so unrelated roots
//! never see each other's traversal state. The first cycle found is
//! reported as the path from the first occurrence of the repeated task
//! through its repetition, e.g. `A -> B -> C -> A`.

use std::collections::HashSet;

use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;
use crate::errors::CycleError;

/// Verify that nothing reachable from `roots` depends on itself.
pub fn check_acyclic(graph: &TaskGraph, roots: &[TaskId]) -> Result<(), CycleError> {
    // Tasks whose whole dependency subtree is known to be acyclic.
    let mut verified: HashSet<TaskId> = HashSet::new();

    for root in roots {
        let mut path = Vec::new();
        visit(graph, *root, &mut path, &mut verified)?;
        debug_assert!(path.is_empty());
    }

    debug!(roots = roots.len(), verified = verified.len(), "dependency graph is acyclic");
    Ok(())
}

fn visit(
    graph: &TaskGraph,
    task: TaskId,
    path: &mut Vec<TaskId>,
    verified: &mut HashSet<TaskId>,
) -> Result<(), CycleError> {
    if let Some(start) = path.iter().position(|t| *t == task) {
        let mut cycle: Vec<String> = path[start..].iter().map(|t| graph.name_of(*t)).collect();
        cycle.push(graph.name_of(task));
        return Err(CycleError { path: cycle });
    }

    if verified.contains(&task) {
        return Ok(());
    }

    path.push(task);
    for dep in graph.dependencies_of(task) {
        visit(graph, *dep, path, verified)?;
    }
    path.pop();

    verified.insert(task);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task_info::TaskSpec;

    fn graph_with(names: &[&str]) -> (TaskGraph, Vec<TaskId>) {
        let mut graph = TaskGraph::new();
        let ids = names
            .iter()
            .map(|n| graph.add_task(TaskSpec::new(*n, "noop")).unwrap())
            .collect();
        (graph, ids)
    }

    #[test]
    fn diamond_is_acyclic() {
        // A -> B -> D, A -> C -> D
        let (mut graph, ids) = graph_with(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(a, c).unwrap();
        graph.add_dependency(b, d).unwrap();
        graph.add_dependency(c, d).unwrap();

        assert!(check_acyclic(&graph, &[a, c]).is_ok());
    }

    #[test]
    fn three_cycle_reports_full_path() {
        // A -> B -> C -> A
        let (mut graph, ids) = graph_with(&["A", "B", "C"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, c).unwrap();
        graph.add_dependency(c, a).unwrap();

        let err = check_acyclic(&graph, &[a, b, c]).unwrap_err();
        assert_eq!(err.path, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn cycle_below_root_excludes_prefix() {
        // R -> X -> Y -> X
        let (mut graph, ids) = graph_with(&["R", "X", "Y"]);
        let (r, x, y) = (ids[0], ids[1], ids[2]);
        graph.add_dependency(r, x).unwrap();
        graph.add_dependency(x, y).unwrap();
        graph.add_dependency(y, x).unwrap();

        let err = check_acyclic(&graph, &[r]).unwrap_err();
        assert_eq!(err.path, vec!["X", "Y", "X"]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let (mut graph, ids) = graph_with(&["A"]);
        graph.add_dependency(ids[0], ids[0]).unwrap();

        let err = check_acyclic(&graph, &ids).unwrap_err();
        assert_eq!(err.path, vec!["A", "A"]);
    }

    #[test]
    fn cycle_unreachable_from_roots_is_ignored() {
        let (mut graph, ids) = graph_with(&["root", "P", "Q"]);
        graph.add_dependency(ids[1], ids[2]).unwrap();
        graph.add_dependency(ids[2], ids[1]).unwrap();

        assert!(check_acyclic(&graph, &[ids[0]]).is_ok());
    }
}
