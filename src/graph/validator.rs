//! Structural admission gate for submitted graphs.
//!
//! Validation is a pure function with no side effects: it either admits a
//! graph or reports the first violation found. The check order is top-level
//! fields, each node (with the per-variant configuration hook), the entry
//! node, then each edge.
//!
//! Cycles are deliberately not rejected here: the sequential dispatch
//! protocol never revisits a node through static edges, so a cycle is only
//! reachable via a router-provided successor and is bounded by the graph
//! deadline.

use miette::Diagnostic;
use thiserror::Error;

use super::model::Graph;

/// A structural violation that keeps a graph out of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error("graph id is required")]
    #[diagnostic(code(dagflow::validate::missing_id))]
    MissingId,

    #[error("graph version is required")]
    #[diagnostic(code(dagflow::validate::missing_version))]
    MissingVersion,

    #[error("graph must have at least one node")]
    #[diagnostic(code(dagflow::validate::empty_nodes))]
    EmptyNodes,

    #[error("invalid node {node_id:?}: {cause}")]
    #[diagnostic(code(dagflow::validate::invalid_node))]
    InvalidNode { node_id: String, cause: String },

    #[error("edge {from} -> {to} references missing node {missing}")]
    #[diagnostic(
        code(dagflow::validate::dangling_edge),
        help("every edge endpoint must name a key of `nodes`")
    )]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    #[error("entry node {entry} not found in graph")]
    #[diagnostic(code(dagflow::validate::unknown_entry_node))]
    UnknownEntryNode { entry: String },
}

/// Validates graph structure before any execution state is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fail-fast structural validation. Pure and deterministic; nodes are
    /// visited in sorted id order so the first violation reported does not
    /// depend on map iteration order.
    pub fn validate(&self, graph: &Graph) -> Result<(), ValidationError> {
        if graph.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if graph.version.is_empty() {
            return Err(ValidationError::MissingVersion);
        }
        if graph.nodes.is_empty() {
            return Err(ValidationError::EmptyNodes);
        }

        let mut node_ids: Vec<&String> = graph.nodes.keys().collect();
        node_ids.sort();
        for node_id in node_ids {
            if node_id.is_empty() {
                return Err(ValidationError::InvalidNode {
                    node_id: node_id.clone(),
                    cause: "node id is required".to_string(),
                });
            }
            // Variant-specific hook; its message is surfaced verbatim.
            if let Err(cause) = graph.nodes[node_id].validate() {
                return Err(ValidationError::InvalidNode {
                    node_id: node_id.clone(),
                    cause: cause.to_string(),
                });
            }
        }

        if let Some(entry) = graph.entry_node.as_deref() {
            if !graph.nodes.contains_key(entry) {
                return Err(ValidationError::UnknownEntryNode {
                    entry: entry.to_string(),
                });
            }
        }

        for edge in &graph.edges {
            if !graph.nodes.contains_key(&edge.from) {
                return Err(ValidationError::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: edge.from.clone(),
                });
            }
            if !graph.nodes.contains_key(&edge.to) {
                return Err(ValidationError::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: edge.to.clone(),
                });
            }
        }

        Ok(())
    }
}
