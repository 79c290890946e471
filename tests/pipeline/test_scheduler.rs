use aed::core::pipeline::{schedule, ScheduleError};
use aed_types::{Edge, Node, NodeKind, PipelineGraph};
use serde_json::json;

fn node(id: &str, kind: NodeKind) -> Node {
    Node::new(id, kind, "SORT", json!({}))
}

#[test]
fn test_every_edge_points_forward() {
    let graph = PipelineGraph::new(
        vec![
            node("load", NodeKind::Load),
            node("join", NodeKind::Transform),
            node("left", NodeKind::Source),
            node("right", NodeKind::Source),
        ],
        vec![
            Edge::new("left", "join"),
            Edge::new("right", "join"),
            Edge::new("join", "load"),
        ],
    );
    let order = schedule(&graph).unwrap();
    assert_eq!(order, vec!["left", "right", "join", "load"]);

    let position = |id: &str| order.iter().position(|n| n == id).unwrap();
    for edge in &graph.edges {
        assert!(position(&edge.from) < position(&edge.to));
    }
}

#[test]
fn test_order_is_deterministic() {
    let graph = PipelineGraph::new(
        vec![
            node("c", NodeKind::Source),
            node("a", NodeKind::Source),
            node("b", NodeKind::Source),
        ],
        vec![],
    );
    for _ in 0..5 {
        assert_eq!(schedule(&graph).unwrap(), vec!["a", "b", "c"]);
    }
}

#[test]
fn test_cycle_error_names_the_cycle() {
    let graph = PipelineGraph::new(
        vec![
            node("src", NodeKind::Source),
            node("x", NodeKind::Transform),
            node("y", NodeKind::Transform),
        ],
        vec![Edge::new("src", "x"), Edge::new("x", "y"), Edge::new("y", "x")],
    );
    match schedule(&graph) {
        Err(ScheduleError::Cycle(err)) => {
            assert_eq!(err.cycles, vec![vec!["x".to_string(), "y".to_string()]]);
        }
        other => panic!("expected a cycle error, got {:?}", other),
    }
}

#[test]
fn test_unknown_edge_endpoint() {
    let graph = PipelineGraph::new(
        vec![node("src", NodeKind::Source)],
        vec![Edge::new("src", "missing")],
    );
    match schedule(&graph) {
        Err(ScheduleError::UnknownNode { index, node_id }) => {
            assert_eq!(index, 0);
            assert_eq!(node_id, "missing");
        }
        other => panic!("expected an unknown node error, got {:?}", other),
    }
}
