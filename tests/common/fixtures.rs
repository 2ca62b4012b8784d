use dagflow::graph::{Graph, GraphBuilder, Node};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};

/// `A(start) -> B(executor) -> C(end)`, entry `A`.
pub fn linear_graph() -> Graph {
    GraphBuilder::new("linear", "1.0")
        .add_node("A", Node::start())
        .add_node("B", Node::executor(json!({"task": "greet"})))
        .add_node("C", Node::end())
        .add_edge("A", "B")
        .add_edge("B", "C")
        .entry_node("A")
        .build()
}

/// `A(start) -> R(router)`, static edges `R -> X -> E` and `Y -> E`.
///
/// The router is expected to override the static `R -> X` edge via
/// `next_node`.
pub fn router_graph() -> Graph {
    GraphBuilder::new("routed", "1.0")
        .add_node("A", Node::start())
        .add_node("R", Node::router(json!({"routes": {"default": "X"}})))
        .add_node("X", Node::executor(json!({"task": "left"})))
        .add_node("Y", Node::executor(json!({"task": "right"})))
        .add_node("E", Node::end())
        .add_edge("A", "R")
        .add_edge("R", "X")
        .add_edge("X", "E")
        .add_edge("Y", "E")
        .entry_node("A")
        .build()
}

/// `A(start) -> E(end)`: completes during the entry dispatch itself.
pub fn start_end_graph() -> Graph {
    GraphBuilder::new("trivial", "1.0")
        .add_node("A", Node::start())
        .add_node("E", Node::end())
        .add_edge("A", "E")
        .entry_node("A")
        .build()
}

pub fn inputs_with(key: &str, value: Value) -> FxHashMap<String, Value> {
    let mut inputs = FxHashMap::default();
    inputs.insert(key.to_string(), value);
    inputs
}
