//! Topological ordering of pipeline nodes.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use aed_types::PipelineGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use thiserror::Error;

/// Nodes that could not be ordered, grouped by strongly connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub cycles: Vec<Vec<String>>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .cycles
            .iter()
            .map(|cycle| format!("[{}]", cycle.join(", ")))
            .collect();
        write!(f, "pipeline contains a cycle among nodes {}", groups.join(", "))
    }
}

impl std::error::Error for CycleError {}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error("edge {index} references unknown node '{node_id}'")]
    UnknownNode { index: usize, node_id: String },
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        let code = match &err {
            ScheduleError::Cycle(_) => "ETL-SCHED-001",
            ScheduleError::UnknownNode { .. } => "ETL-SCHED-002",
        };
        AppError::new(ErrorCategory::StructuralError, err.to_string()).with_code(code)
    }
}

/// Order nodes so every edge points forward. Ties between ready nodes are broken by
/// ascending node id, which makes the order deterministic.
pub fn schedule(graph: &PipelineGraph) -> Result<Vec<String>, ScheduleError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ids: Vec<&str> = Vec::new();
    for node in &graph.nodes {
        index.entry(node.id.as_str()).or_insert_with(|| {
            ids.push(node.id.as_str());
            ids.len() - 1
        });
    }

    let mut in_degree = vec![0usize; ids.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (edge_idx, edge) in graph.edges.iter().enumerate() {
        let lookup = |id: &str| {
            index.get(id).copied().ok_or_else(|| ScheduleError::UnknownNode {
                index: edge_idx,
                node_id: id.to_string(),
            })
        };
        let from = lookup(&edge.from)?;
        let to = lookup(&edge.to)?;
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<(&str, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse((ids[idx], idx)))
        .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(Reverse((id, idx))) = ready.pop() {
        order.push(id.to_string());
        for &next in &successors[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((ids[next], next)));
            }
        }
    }

    if order.len() < ids.len() {
        return Err(cycle_error(&ids, &successors).into());
    }
    Ok(order)
}

fn cycle_error(ids: &[&str], successors: &[Vec<usize>]) -> CycleError {
    let mut graph = DiGraph::<(), ()>::new();
    let indices: Vec<NodeIndex> = ids.iter().map(|_| graph.add_node(())).collect();
    for (from, targets) in successors.iter().enumerate() {
        for &to in targets {
            graph.add_edge(indices[from], indices[to], ());
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.find_edge(component[0], component[0]).is_some()
        })
        .map(|component| {
            let mut members: Vec<String> = component
                .into_iter()
                .map(|idx| ids[idx.index()].to_string())
                .collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    CycleError { cycles }
}
