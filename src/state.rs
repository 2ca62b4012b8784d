//! The persisted execution document.
//!
//! [`ExecutionRecord`] is the canonical mutable state of one execution,
//! serialized into the store as a self-describing JSON document. It is
//! created at submission and mutated only by the execution manager, on
//! dispatch and on completion-event receipt. The embedded graph copy means
//! workers and later reads never need a separate graph catalog.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Graph;
use crate::types::ExecutionStatus;

/// Per-node slice of an execution's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeState {
    fn pending(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            output: None,
            error: None,
        }
    }
}

/// Canonical mutable document describing one execution.
///
/// Invariants upheld by the manager:
/// - exactly one record per execution id,
/// - terminal statuses are absorbing,
/// - every node of the embedded graph has a `node_states` entry,
/// - a completed execution has no failed node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub graph: Graph,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub inputs: FxHashMap<String, Value>,
    pub node_states: FxHashMap<String, NodeState>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Builds the initial record for a freshly admitted submission: status
    /// `Running`, every node `Pending`, `submitted_at` now.
    #[must_use]
    pub fn new(
        execution_id: impl Into<String>,
        graph: Graph,
        inputs: FxHashMap<String, Value>,
    ) -> Self {
        let node_states = graph
            .nodes
            .keys()
            .map(|node_id| (node_id.clone(), NodeState::pending(node_id.clone())))
            .collect();
        Self {
            execution_id: execution_id.into(),
            graph,
            status: ExecutionStatus::Running,
            inputs,
            node_states,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn node_state(&self, node_id: &str) -> Option<&NodeState> {
        self.node_states.get(node_id)
    }

    pub fn node_state_mut(&mut self, node_id: &str) -> Option<&mut NodeState> {
        self.node_states.get_mut(node_id)
    }

    /// Drives the record into a terminal status, stamping `completed_at`.
    ///
    /// The caller is responsible for ensuring the record is not already
    /// terminal; terminal states are absorbing.
    pub fn mark_terminal(&mut self, status: ExecutionStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        debug_assert!(!self.is_terminal());
        self.status = status;
        self.completed_at = Some(Utc::now());
        if let Some(message) = error {
            self.error = Some(message);
        }
    }
}
