use aed::core::pipeline::{validate_document, validate_graph, ValidationSettings};
use aed_types::{Edge, Node, NodeKind, PipelineGraph};
use serde_json::json;

fn linear_graph() -> PipelineGraph {
    PipelineGraph::new(
        vec![
            Node::new(
                "src",
                NodeKind::Source,
                "CSV_SOURCE",
                json!({"file_path": "sales.csv"}),
            ),
            Node::new(
                "us_only",
                NodeKind::Transform,
                "FILTER",
                json!({"column": "country", "operator": "==", "value": "US"}),
            ),
            Node::new(
                "out",
                NodeKind::Load,
                "CSV_LOAD",
                json!({"output_path": "us.csv"}),
            ),
        ],
        vec![Edge::new("src", "us_only"), Edge::new("us_only", "out")],
    )
}

#[test]
fn test_complete_acyclic_graph_is_valid() {
    let report = validate_graph(&linear_graph(), &ValidationSettings::default());
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_cycle_is_reported() {
    let mut graph = linear_graph();
    graph.nodes.push(Node::new(
        "sorter",
        NodeKind::Transform,
        "SORT",
        json!({"columns": ["amount"]}),
    ));
    graph.edges.push(Edge::new("us_only", "sorter"));
    graph.edges.push(Edge::new("sorter", "us_only"));

    let report = validate_graph(&graph, &ValidationSettings::default());
    assert!(!report.valid);
    assert!(report
        .errors
        .iter()
        .any(|error| error.starts_with("Cycle detected: ")));
}

#[test]
fn test_file_loads_need_output_path() {
    for subtype in ["CSV_LOAD", "EXCEL_LOAD", "JSON_LOAD"] {
        let mut graph = linear_graph();
        graph.nodes[2] = Node::new("out", NodeKind::Load, subtype, json!({}));
        let report = validate_graph(&graph, &ValidationSettings::default());
        assert_eq!(
            report.errors,
            vec![format!("Node 'out': {} requires 'output_path'", subtype)]
        );
    }
}

#[test]
fn test_load_with_outgoing_edge_is_rejected() {
    let mut graph = linear_graph();
    graph.nodes.push(Node::new(
        "trimmed",
        NodeKind::Transform,
        "SELECT",
        json!({"columns": ["country"]}),
    ));
    graph.nodes.push(Node::new(
        "again",
        NodeKind::Load,
        "CSV_LOAD",
        json!({"output_path": "again.csv"}),
    ));
    graph.edges.push(Edge::new("out", "trimmed"));
    graph.edges.push(Edge::new("trimmed", "again"));

    let report = validate_graph(&graph, &ValidationSettings::default());
    assert!(!report.valid);
    assert_eq!(
        report.errors,
        vec!["Load node 'out' cannot have outgoing connections".to_string()]
    );
}

#[test]
fn test_missing_load_and_dangling_edge() {
    let graph = PipelineGraph::new(
        vec![Node::new(
            "src",
            NodeKind::Source,
            "JSON_SOURCE",
            json!({"file_path": "a.json"}),
        )],
        vec![Edge::new("src", "ghost")],
    );
    let report = validate_graph(&graph, &ValidationSettings::default());
    assert!(!report.valid);
    assert!(report
        .errors
        .contains(&"Pipeline must have at least one LOAD node".to_string()));
    assert!(report.errors.iter().any(|error| error.contains("ghost")));
}

#[test]
fn test_large_graph_warning_respects_threshold() {
    let report = validate_graph(
        &linear_graph(),
        &ValidationSettings {
            large_graph_threshold: 2,
        },
    );
    assert!(report.valid);
    assert_eq!(
        report.warnings,
        vec!["Pipeline has 3 nodes; graphs above 2 nodes may execute slowly".to_string()]
    );
}

#[test]
fn test_document_entry_point() {
    let document = serde_json::to_value(linear_graph()).unwrap();
    assert!(validate_document(&document, &ValidationSettings::default()).valid);

    let report = validate_document(&json!({"nodes": "nope"}), &ValidationSettings::default());
    assert!(!report.valid);
    assert!(report.errors[0].starts_with("Invalid pipeline document:"));

    let report = validate_document(&json!({"nodes": [], "edges": []}), &ValidationSettings::default());
    assert_eq!(
        report.errors,
        vec!["Pipeline must contain at least one node".to_string()]
    );
}

#[test]
fn test_validation_does_not_mutate_graph() {
    let graph = linear_graph();
    let before = graph.clone();
    let _ = validate_graph(&graph, &ValidationSettings::default());
    assert_eq!(graph, before);
}
