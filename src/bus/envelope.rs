//! Wire envelopes exchanged over the message bus.
//!
//! Every message shares the same outer shape — id, type, timestamp,
//! execution id, and a free-form `data` map — while bodies vary by type.
//! [`NodeCompletion`] is the typed view of a completion envelope's body; the
//! conversion lives here so the manager never pokes at raw maps.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::state::ExecutionRecord;
use crate::types::{EventType, NodeType};

/// Outer shape shared by every message on every topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub execution_id: String,
    #[serde(default)]
    pub data: FxHashMap<String, Value>,
}

impl Envelope {
    fn new(event_type: EventType, execution_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            execution_id: execution_id.into(),
            data: FxHashMap::default(),
        }
    }

    /// Builds the work envelope dispatched to executor/router workers.
    ///
    /// Carries the node identity, the execution's inputs, a snapshot of all
    /// node states, and the advisory per-node timeout enforced by the worker
    /// tier.
    pub fn work(
        record: &ExecutionRecord,
        node_id: &str,
        node_type: NodeType,
        node_timeout_secs: u64,
    ) -> Result<Self, serde_json::Error> {
        let mut envelope = Self::new(EventType::NodeWork, record.execution_id.clone());
        envelope
            .data
            .insert("node_id".to_string(), Value::String(node_id.to_string()));
        envelope.data.insert(
            "node_type".to_string(),
            Value::String(node_type.as_str().to_string()),
        );
        envelope.data.insert(
            "graph_id".to_string(),
            Value::String(record.execution_id.clone()),
        );
        envelope
            .data
            .insert("state".to_string(), serde_json::to_value(&record.inputs)?);
        envelope.data.insert(
            "node_state".to_string(),
            serde_json::to_value(&record.node_states)?,
        );
        envelope.data.insert(
            "node_timeout_secs".to_string(),
            Value::from(node_timeout_secs),
        );
        Ok(envelope)
    }

    /// Builds an informational envelope for the `graph.events` topic.
    #[must_use]
    pub fn graph_event(
        execution_id: impl Into<String>,
        event_type: EventType,
        data: FxHashMap<String, Value>,
    ) -> Self {
        let mut envelope = Self::new(event_type, execution_id);
        envelope.data = data;
        envelope
    }
}

/// A completion envelope failed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EnvelopeError {
    #[error("completion envelope missing field {0:?}")]
    #[diagnostic(code(dagflow::envelope::missing_field))]
    MissingField(&'static str),

    #[error("completion envelope field {0:?} has the wrong type")]
    #[diagnostic(code(dagflow::envelope::invalid_field))]
    InvalidField(&'static str),
}

/// Typed body of a `node.completed` envelope.
///
/// `error` presence is the failure signal; `next_node` is populated only by
/// router workers and overrides edge-based successor selection.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeCompletion {
    pub node_id: String,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub next_node: Option<String>,
}

impl NodeCompletion {
    #[must_use]
    pub fn succeeded(node_id: impl Into<String>, output: Value) -> Self {
        Self {
            node_id: node_id.into(),
            output: Some(output),
            error: None,
            next_node: None,
        }
    }

    #[must_use]
    pub fn failed(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            output: None,
            error: Some(error.into()),
            next_node: None,
        }
    }

    /// Router success carrying the selected successor.
    #[must_use]
    pub fn routed(node_id: impl Into<String>, next_node: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            output: None,
            error: None,
            next_node: Some(next_node.into()),
        }
    }

    /// Parses a completion envelope body. An empty `next_node` string is
    /// treated as absent, matching what router workers send when they decline
    /// to route.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, EnvelopeError> {
        let node_id = match envelope.data.get("node_id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(EnvelopeError::InvalidField("node_id")),
            None => return Err(EnvelopeError::MissingField("node_id")),
        };
        let error = match envelope.data.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => return Err(EnvelopeError::InvalidField("error")),
        };
        let next_node = match envelope.data.get("next_node") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(_) => return Err(EnvelopeError::InvalidField("next_node")),
        };
        let output = envelope
            .data
            .get("output")
            .filter(|v| !v.is_null())
            .cloned();
        Ok(Self {
            node_id,
            output,
            error,
            next_node,
        })
    }

    /// Builds the wire envelope a worker would publish on `node.completed`.
    #[must_use]
    pub fn into_envelope(self, execution_id: impl Into<String>) -> Envelope {
        let mut envelope = Envelope::new(EventType::NodeCompleted, execution_id);
        envelope
            .data
            .insert("node_id".to_string(), Value::String(self.node_id));
        if let Some(output) = self.output {
            envelope.data.insert("output".to_string(), output);
        }
        if let Some(error) = self.error {
            envelope
                .data
                .insert("error".to_string(), Value::String(error));
        }
        if let Some(next_node) = self.next_node {
            envelope
                .data
                .insert("next_node".to_string(), Value::String(next_node));
        }
        envelope
    }
}
