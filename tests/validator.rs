mod common;

use common::*;
use dagflow::graph::{GraphBuilder, Node, ValidationError, Validator};
use serde_json::json;

#[test]
fn admits_a_well_formed_graph() {
    let validator = Validator::new();
    assert!(validator.validate(&linear_graph()).is_ok());
    assert!(validator.validate(&router_graph()).is_ok());
}

#[test]
fn rejects_missing_id_and_version_first() {
    let validator = Validator::new();

    let graph = GraphBuilder::new("", "1.0").add_node("A", Node::start()).build();
    assert_eq!(validator.validate(&graph), Err(ValidationError::MissingId));

    let graph = GraphBuilder::new("g", "").add_node("A", Node::start()).build();
    assert_eq!(
        validator.validate(&graph),
        Err(ValidationError::MissingVersion)
    );
}

#[test]
fn rejects_empty_node_set() {
    let graph = GraphBuilder::new("g", "1.0").build();
    assert_eq!(
        Validator::new().validate(&graph),
        Err(ValidationError::EmptyNodes)
    );
}

#[test]
fn rejects_empty_node_id() {
    let graph = GraphBuilder::new("g", "1.0")
        .add_node("", Node::executor(json!({})))
        .build();
    let error = Validator::new().validate(&graph).unwrap_err();
    assert!(matches!(
        error,
        ValidationError::InvalidNode { ref node_id, .. } if node_id.is_empty()
    ));
}

#[test]
fn surfaces_the_variant_hook_cause_verbatim() {
    let graph = GraphBuilder::new("g", "1.0")
        .add_node("A", Node::executor(json!("not-an-object")))
        .build();
    assert_eq!(
        Validator::new().validate(&graph),
        Err(ValidationError::InvalidNode {
            node_id: "A".to_string(),
            cause: "executor config must be a JSON object".to_string(),
        })
    );
}

#[test]
fn rejects_unknown_entry_node() {
    let graph = GraphBuilder::new("g", "1.0")
        .add_node("A", Node::start())
        .entry_node("missing")
        .build();
    assert_eq!(
        Validator::new().validate(&graph),
        Err(ValidationError::UnknownEntryNode {
            entry: "missing".to_string()
        })
    );
}

#[test]
fn rejects_dangling_edges_on_either_endpoint() {
    let graph = GraphBuilder::new("g", "1.0")
        .add_node("A", Node::start())
        .add_edge("ghost", "A")
        .build();
    assert_eq!(
        Validator::new().validate(&graph),
        Err(ValidationError::DanglingEdge {
            from: "ghost".to_string(),
            to: "A".to_string(),
            missing: "ghost".to_string(),
        })
    );

    let graph = GraphBuilder::new("g", "1.0")
        .add_node("A", Node::start())
        .add_edge("A", "ghost")
        .build();
    assert_eq!(
        Validator::new().validate(&graph),
        Err(ValidationError::DanglingEdge {
            from: "A".to_string(),
            to: "ghost".to_string(),
            missing: "ghost".to_string(),
        })
    );
}

#[test]
fn cycles_are_admitted() {
    let graph = GraphBuilder::new("cyclic", "1.0")
        .add_node("A", Node::executor(json!({})))
        .add_node("B", Node::executor(json!({})))
        .add_edge("A", "B")
        .add_edge("B", "A")
        .build();
    assert!(Validator::new().validate(&graph).is_ok());
}
