//! Fluent construction of pipeline graphs.
//!
//! `GraphBuilder` assembles a [`Graph`] in code, which is mostly useful for
//! tests and embedders; transport layers typically deserialize graphs
//! straight from JSON. The builder performs no validation — admission checks
//! run in [`crate::graph::Validator`] at submission.

use rustc_hash::FxHashMap;

use super::model::{Edge, Graph, Node};

/// Builder for [`Graph`] values.
///
/// # Examples
///
/// ```
/// use dagflow::graph::{GraphBuilder, Node};
///
/// let graph = GraphBuilder::new("greeter", "1.0")
///     .add_node("in", Node::start())
///     .add_node("work", Node::executor(serde_json::json!({"task": "greet"})))
///     .add_node("out", Node::end())
///     .add_edge("in", "work")
///     .add_edge("work", "out")
///     .entry_node("in")
///     .build();
///
/// assert_eq!(graph.find_next_node("in"), Some("work"));
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    id: String,
    version: String,
    nodes: FxHashMap<String, Node>,
    edges: Vec<Edge>,
    entry_node: Option<String>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            nodes: FxHashMap::default(),
            edges: Vec::new(),
            entry_node: None,
        }
    }

    /// Registers a node under `node_id`. Re-registering an id replaces the
    /// previous node.
    #[must_use]
    pub fn add_node(mut self, node_id: impl Into<String>, node: Node) -> Self {
        self.nodes.insert(node_id.into(), node);
        self
    }

    /// Appends a directed edge. Edge order is preserved and drives successor
    /// selection.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    #[must_use]
    pub fn add_labeled_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            label: Some(label.into()),
        });
        self
    }

    #[must_use]
    pub fn entry_node(mut self, node_id: impl Into<String>) -> Self {
        self.entry_node = Some(node_id.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            version: self.version,
            nodes: self.nodes,
            edges: self.edges,
            entry_node: self.entry_node,
        }
    }
}
