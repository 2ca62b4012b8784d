//! Graph structure submitted by clients.
//!
//! A [`Graph`] is immutable after submission: the coordinator embeds a copy
//! into every execution record so workers and later reads never need a
//! separate graph catalog. Nodes are a tagged union over the variant set
//! `{start, executor, router, end}`; the coordinator reads only the variant
//! tag, never the per-variant configuration.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::NodeType;

/// A directed edge between two nodes, with an optional display label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }
}

/// A single node in a pipeline graph.
///
/// The `type` tag selects the variant; `config` is opaque to the coordinator
/// and travels untouched to whichever worker picks up the node's work
/// envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Start {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        config: Value,
    },
    Executor {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        config: Value,
    },
    Router {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        config: Value,
    },
    End {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        config: Value,
    },
}

/// A node variant rejected its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeConfigError {
    #[error("{node_type} config must be a JSON object")]
    NotAnObject { node_type: NodeType },
}

impl Node {
    pub fn start() -> Self {
        Self::Start { config: Value::Null }
    }

    pub fn executor(config: Value) -> Self {
        Self::Executor { config }
    }

    pub fn router(config: Value) -> Self {
        Self::Router { config }
    }

    pub fn end() -> Self {
        Self::End { config: Value::Null }
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Start { .. } => NodeType::Start,
            Self::Executor { .. } => NodeType::Executor,
            Self::Router { .. } => NodeType::Router,
            Self::End { .. } => NodeType::End,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Value {
        match self {
            Self::Start { config }
            | Self::Executor { config }
            | Self::Router { config }
            | Self::End { config } => config,
        }
    }

    /// Per-variant configuration hook invoked by the admission validator.
    ///
    /// Configuration, when present, must be a JSON object; the coordinator
    /// does not interpret its keys.
    pub fn validate(&self) -> Result<(), NodeConfigError> {
        match self.config() {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(NodeConfigError::NotAnObject {
                node_type: self.node_type(),
            }),
        }
    }
}

/// A client-submitted pipeline graph.
///
/// `id` is client-supplied and used for logging only; executions are keyed by
/// the coordinator-assigned execution id. Edge order is significant: the
/// successor rule picks the first outgoing edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub version: String,
    pub nodes: FxHashMap<String, Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_node: Option<String>,
}

impl Graph {
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Outgoing edges of `from`, in submission order.
    pub fn outgoing_edges<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == from)
    }

    /// Linear successor rule: the `to` of the first outgoing edge of `from`,
    /// in `edges` order. Router workers override this through `next_node`.
    #[must_use]
    pub fn find_next_node(&self, from: &str) -> Option<&str> {
        self.edges.iter().find(|e| e.from == from).map(|e| e.to.as_str())
    }

    /// Resolves the node the entry dispatch starts from.
    ///
    /// Prefers the explicit `entry_node`; otherwise falls back to the unique
    /// `start`-typed node. Returns `None` when neither resolves, in which
    /// case the execution is never dispatched and the deadline supervisor
    /// eventually reaps it.
    #[must_use]
    pub fn entry(&self) -> Option<&str> {
        if let Some(entry) = self.entry_node.as_deref() {
            return Some(entry);
        }
        let mut starts = self
            .nodes
            .iter()
            .filter(|(_, node)| node.node_type().is_start())
            .map(|(id, _)| id.as_str());
        match (starts.next(), starts.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }
}
