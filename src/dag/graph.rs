// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::{RebundleError, Result};
use crate::types::{TaskId, TaskKind};

/// One task as declared: its id, direct dependencies and kind.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: TaskId,
    pub deps: Vec<TaskId>,
    pub kind: TaskKind,
}

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one starts.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that list this one as a dependency.
    dependents: Vec<TaskId>,
    kind: TaskKind,
}

/// Validated task graph keyed by task id.
///
/// Construction fails on duplicate ids, unknown dependencies and cycles, so
/// every `TaskGraph` value is a DAG.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, DagNode>,
}

impl TaskGraph {
    pub fn new(specs: impl IntoIterator<Item = TaskSpec>) -> Result<Self> {
        let mut nodes: BTreeMap<TaskId, DagNode> = BTreeMap::new();

        // First pass: create nodes with their dependency lists.
        for spec in specs {
            let mut deps: Vec<TaskId> = Vec::with_capacity(spec.deps.len());
            for dep in spec.deps {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            let node = DagNode {
                deps,
                dependents: Vec::new(),
                kind: spec.kind,
            };
            if nodes.insert(spec.id.clone(), node).is_some() {
                return Err(RebundleError::ConfigError(format!(
                    "task '{}' is defined more than once",
                    spec.id
                )));
            }
        }

        // Every dependency must name a declared task.
        for (id, node) in nodes.iter() {
            for dep in node.deps.iter() {
                if !nodes.contains_key(dep) {
                    return Err(RebundleError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}' in `after`",
                        id, dep
                    )));
                }
                if dep == id {
                    return Err(RebundleError::DagCycle(vec![id.clone()]));
                }
            }
        }

        detect_cycle(&nodes)?;

        // Second pass: populate dependents based on deps.
        let edges: Vec<(TaskId, TaskId)> = nodes
            .iter()
            .flat_map(|(id, node)| node.deps.iter().map(move |dep| (dep.clone(), id.clone())))
            .collect();
        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Ok(Self { nodes })
    }

    /// All task ids, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn kind_of(&self, id: &str) -> Option<TaskKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    /// `target` plus everything it transitively depends on.
    pub fn closure_of(&self, target: &TaskId) -> Result<BTreeSet<TaskId>> {
        if !self.nodes.contains_key(target) {
            return Err(RebundleError::TaskNotFound(target.to_string()));
        }

        let mut seen = BTreeSet::new();
        let mut stack = vec![target.clone()];
        while let Some(id) = stack.pop() {
            if seen.insert(id.clone()) {
                stack.extend(self.dependencies_of(id.as_str()).iter().cloned());
            }
        }
        Ok(seen)
    }

    /// Dependencies-first order of every task.
    pub fn topological_order(&self) -> Vec<TaskId> {
        let graph = self.petgraph();
        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(TaskId::new).collect(),
            // Unreachable for a constructed graph; fall back to name order.
            Err(_) => self.nodes.keys().cloned().collect(),
        }
    }

    /// Edge direction: dep -> task.
    fn petgraph(&self) -> DiGraphMap<&str, ()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for (id, node) in self.nodes.iter() {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }
        graph
    }
}

/// Find a cycle and report the tasks on it, in dependency order.
fn detect_cycle(nodes: &BTreeMap<TaskId, DagNode>) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for id in nodes.keys() {
        graph.add_node(id.as_str());
    }
    for (id, node) in nodes.iter() {
        for dep in node.deps.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    // Any strongly connected component with more than one node holds a cycle.
    let Some(component) = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .min_by_key(|scc| scc.iter().min().copied())
    else {
        return Ok(());
    };

    let members: BTreeSet<&str> = component.iter().copied().collect();
    let Some(start) = members.iter().next().copied() else {
        return Ok(());
    };

    // Breadth-first walk inside the component back to `start`.
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut closing = None;
    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !members.contains(next) {
                continue;
            }
            if next == start {
                closing = Some(node);
                break;
            }
            if !parent.contains_key(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
        if closing.is_some() {
            break;
        }
    }

    let mut cycle = Vec::new();
    let mut cursor = closing.unwrap_or(start);
    while cursor != start {
        cycle.push(TaskId::new(cursor));
        match parent.get(cursor) {
            Some(p) => cursor = p,
            None => break,
        }
    }
    cycle.push(TaskId::new(start));
    cycle.reverse();

    Err(RebundleError::DagCycle(cycle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            id: TaskId::new(id),
            deps: deps.iter().map(|d| TaskId::new(*d)).collect(),
            kind: TaskKind::Finite,
        }
    }

    #[test]
    fn adjacency_is_bidirectional() {
        let g = TaskGraph::new([spec("a", &[]), spec("b", &["a"]), spec("c", &["a", "b"])]).unwrap();
        assert_eq!(g.dependencies_of("c"), &[TaskId::new("a"), TaskId::new("b")]);
        assert_eq!(g.dependents_of("a"), &[TaskId::new("b"), TaskId::new("c")]);
        assert!(g.dependencies_of("missing").is_empty());
    }

    #[test]
    fn unknown_dependency_is_a_config_error() {
        let err = TaskGraph::new([spec("a", &["ghost"])]).unwrap_err();
        assert!(err.to_string().contains("unknown dependency 'ghost'"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = TaskGraph::new([spec("a", &["a"])]).unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected in task graph: a -> a");
    }

    #[test]
    fn cycle_lists_exactly_the_tasks_on_it() {
        let err = TaskGraph::new([
            spec("a", &["c"]),
            spec("b", &["a"]),
            spec("c", &["b"]),
            spec("d", &["a"]),
        ])
        .unwrap_err();
        match err {
            RebundleError::DagCycle(cycle) => {
                // Edges run dep -> dependent: c -> a -> b -> c.
                assert_eq!(
                    cycle,
                    vec![TaskId::new("a"), TaskId::new("b"), TaskId::new("c")]
                );
            }
            other => panic!("expected DagCycle, got {other:?}"),
        }
    }

    #[test]
    fn closure_follows_dependencies_only() {
        let g = TaskGraph::new([
            spec("a", &[]),
            spec("b", &["a"]),
            spec("c", &["b"]),
            spec("other", &[]),
        ])
        .unwrap();
        let closure = g.closure_of(&TaskId::new("c")).unwrap();
        assert_eq!(closure.len(), 3);
        assert!(!closure.contains("other"));

        let err = g.closure_of(&TaskId::new("nope")).unwrap_err();
        assert!(matches!(err, RebundleError::TaskNotFound(_)));
    }

    #[test]
    fn topological_order_respects_edges() {
        let g = TaskGraph::new([spec("c", &["b"]), spec("b", &["a"]), spec("a", &[])]).unwrap();
        let order = g.topological_order();
        let pos = |n: &str| order.iter().position(|t| t.as_str() == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }
}
