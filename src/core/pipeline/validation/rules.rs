use super::{Diagnostic, GraphRule, ValidationSettings};
use crate::core::pipeline::catalog::NodeSubtype;
use aed_types::{NodeKind, PipelineGraph};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

pub fn built_in_rules() -> Vec<Box<dyn GraphRule>> {
    vec![
        Box::new(DuplicateNodeIdsRule),
        Box::new(DanglingEdgesRule),
        Box::new(CycleRule),
        Box::new(OrphanNodesRule),
        Box::new(RequiredKindsRule),
        Box::new(NodeConfigRule),
        Box::new(LargeGraphRule),
    ]
}

struct DuplicateNodeIdsRule;

impl GraphRule for DuplicateNodeIdsRule {
    fn name(&self) -> &'static str {
        "duplicate-node-ids"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut reported = IndexSet::new();
        for node in &graph.nodes {
            if !seen.insert(node.id.as_str()) {
                reported.insert(node.id.as_str());
            }
        }
        reported
            .into_iter()
            .map(|id| Diagnostic::error(format!("Duplicate node id '{}'", id)))
            .collect()
    }
}

struct DanglingEdgesRule;

impl GraphRule for DanglingEdgesRule {
    fn name(&self) -> &'static str {
        "dangling-edges"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        let known: HashSet<&str> = graph.nodes.iter().map(|node| node.id.as_str()).collect();
        let mut out = Vec::new();
        for (idx, edge) in graph.edges.iter().enumerate() {
            for (end, id) in [("from", &edge.from), ("to", &edge.to)] {
                if !known.contains(id.as_str()) {
                    out.push(Diagnostic::error(format!(
                        "Edge {}: '{}' node '{}' does not exist",
                        idx, end, id
                    )));
                }
            }
        }
        out
    }
}

/// Depth-first search with an explicit stack; every back edge reports the cycle
/// it closes. Traversal continues after a report so independent cycles are all found.
struct CycleRule;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl GraphRule for CycleRule {
    fn name(&self) -> &'static str {
        "cycles"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &graph.nodes {
            adjacency.entry(node.id.as_str()).or_default();
        }
        for edge in &graph.edges {
            if adjacency.contains_key(edge.to.as_str()) {
                if let Some(targets) = adjacency.get_mut(edge.from.as_str()) {
                    targets.push(edge.to.as_str());
                }
            }
        }

        let mut marks: HashMap<&str, Mark> =
            adjacency.keys().map(|id| (*id, Mark::Unvisited)).collect();
        let mut cycles: IndexSet<String> = IndexSet::new();

        for start in graph.nodes.iter().map(|node| node.id.as_str()) {
            if marks.get(start) != Some(&Mark::Unvisited) {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::OnStack);

            while let Some(top) = stack.last_mut() {
                let (current, cursor) = *top;
                top.1 += 1;
                let Some(&next) = adjacency[current].get(cursor) else {
                    marks.insert(current, Mark::Done);
                    stack.pop();
                    continue;
                };

                match marks.get(next).copied().unwrap_or(Mark::Done) {
                    Mark::OnStack => {
                        let from = stack
                            .iter()
                            .position(|(id, _)| *id == next)
                            .unwrap_or(0);
                        let mut path: Vec<&str> =
                            stack[from..].iter().map(|(id, _)| *id).collect();
                        path.push(next);
                        cycles.insert(format!("Cycle detected: {}", path.join(" → ")));
                    }
                    Mark::Unvisited => {
                        marks.insert(next, Mark::OnStack);
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }

        cycles.into_iter().map(Diagnostic::error).collect()
    }
}

struct OrphanNodesRule;

impl GraphRule for OrphanNodesRule {
    fn name(&self) -> &'static str {
        "orphan-nodes"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for node in &graph.nodes {
            let has_incoming = graph.incoming(&node.id).next().is_some();
            let has_outgoing = graph.outgoing(&node.id).next().is_some();
            let label = node.display_name();
            match node.kind {
                NodeKind::Source if !has_outgoing => out.push(Diagnostic::error(format!(
                    "Source node '{}' has no outgoing connections",
                    label
                ))),
                NodeKind::Load => {
                    if !has_incoming {
                        out.push(Diagnostic::error(format!(
                            "Load node '{}' has no incoming connections",
                            label
                        )));
                    }
                    if has_outgoing {
                        out.push(Diagnostic::error(format!(
                            "Load node '{}' cannot have outgoing connections",
                            label
                        )));
                    }
                }
                NodeKind::Transform => {
                    if !has_incoming {
                        out.push(Diagnostic::error(format!(
                            "Transform node '{}' has no incoming connections",
                            label
                        )));
                    }
                    if !has_outgoing {
                        out.push(Diagnostic::error(format!(
                            "Transform node '{}' has no outgoing connections",
                            label
                        )));
                    }
                }
                _ => {}
            }
            if !has_incoming && !has_outgoing {
                out.push(Diagnostic::error(format!(
                    "Node '{}' is disconnected from the pipeline",
                    label
                )));
            }
        }
        out
    }
}

struct RequiredKindsRule;

impl GraphRule for RequiredKindsRule {
    fn name(&self) -> &'static str {
        "required-kinds"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        [NodeKind::Source, NodeKind::Load]
            .into_iter()
            .filter(|kind| !graph.nodes.iter().any(|node| node.kind == *kind))
            .map(|kind| {
                Diagnostic::error(format!("Pipeline must have at least one {} node", kind))
            })
            .collect()
    }
}

struct NodeConfigRule;

impl GraphRule for NodeConfigRule {
    fn name(&self) -> &'static str {
        "node-config"
    }

    fn check(&self, graph: &PipelineGraph, _: &ValidationSettings) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for node in &graph.nodes {
            let Some(subtype) = NodeSubtype::parse(&node.subtype) else {
                out.push(Diagnostic::error(format!(
                    "Node '{}': unknown subtype '{}'",
                    node.id, node.subtype
                )));
                continue;
            };
            if subtype.kind() != node.kind {
                out.push(Diagnostic::error(format!(
                    "Node '{}': subtype {} is not a {} node",
                    node.id, subtype, node.kind
                )));
                continue;
            }
            if !node.config.is_object() {
                out.push(Diagnostic::error(format!(
                    "Node '{}': configuration must be an object",
                    node.id
                )));
                continue;
            }
            for requirement in subtype.missing_requirements(&node.config) {
                out.push(Diagnostic::error(format!(
                    "Node '{}': {} requires {}",
                    node.id,
                    subtype,
                    requirement.describe()
                )));
            }
        }
        out
    }
}

struct LargeGraphRule;

impl GraphRule for LargeGraphRule {
    fn name(&self) -> &'static str {
        "large-graph"
    }

    fn check(&self, graph: &PipelineGraph, settings: &ValidationSettings) -> Vec<Diagnostic> {
        let count = graph.nodes.len();
        if count > settings.large_graph_threshold {
            vec![Diagnostic::warning(format!(
                "Pipeline has {} nodes; graphs above {} nodes may execute slowly",
                count, settings.large_graph_threshold
            ))]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aed_types::{Edge, Node};
    use serde_json::json;

    fn node(id: &str, kind: NodeKind, subtype: &str) -> Node {
        Node::new(id, kind, subtype, json!({}))
    }

    fn check(rule: &dyn GraphRule, graph: &PipelineGraph) -> Vec<String> {
        rule.check(graph, &ValidationSettings::default())
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_cycle_reports_each_back_edge_once() {
        let graph = PipelineGraph::new(
            vec![
                node("a", NodeKind::Transform, "SORT"),
                node("b", NodeKind::Transform, "SORT"),
                node("c", NodeKind::Transform, "SORT"),
            ],
            vec![
                Edge::new("a", "b"),
                Edge::new("b", "a"),
                Edge::new("b", "a"),
                Edge::new("c", "c"),
            ],
        );
        assert_eq!(
            check(&CycleRule, &graph),
            vec!["Cycle detected: a → b → a", "Cycle detected: c → c"]
        );
    }

    #[test]
    fn test_disconnected_transform_reports_three_errors() {
        let graph = PipelineGraph::new(
            vec![node("t", NodeKind::Transform, "SORT").with_label("Sorter")],
            vec![],
        );
        assert_eq!(
            check(&OrphanNodesRule, &graph),
            vec![
                "Transform node 'Sorter' has no incoming connections",
                "Transform node 'Sorter' has no outgoing connections",
                "Node 'Sorter' is disconnected from the pipeline",
            ]
        );
    }

    #[test]
    fn test_config_rule_kind_mismatch_and_unknown() {
        let graph = PipelineGraph::new(
            vec![
                node("x", NodeKind::Source, "SORT"),
                node("y", NodeKind::Transform, "PIVOT"),
            ],
            vec![],
        );
        assert_eq!(
            check(&NodeConfigRule, &graph),
            vec![
                "Node 'x': subtype SORT is not a SOURCE node",
                "Node 'y': unknown subtype 'PIVOT'",
            ]
        );
    }

    #[test]
    fn test_duplicates_reported_once() {
        let graph = PipelineGraph::new(
            vec![
                node("a", NodeKind::Source, "CSV_SOURCE"),
                node("a", NodeKind::Load, "CSV_LOAD"),
                node("a", NodeKind::Load, "CSV_LOAD"),
            ],
            vec![],
        );
        assert_eq!(check(&DuplicateNodeIdsRule, &graph), vec!["Duplicate node id 'a'"]);
    }
}
