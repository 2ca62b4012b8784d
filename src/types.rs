//! Core domain types for the dagflow coordinator.
//!
//! This module defines the enumerations shared across the crate: the
//! execution/node status lifecycle, the node variant set, and the event
//! types that appear on the wire. Graph structure lives in [`crate::graph`];
//! the persisted execution document lives in [`crate::state`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bus::{TOPIC_EXECUTOR_WORK, TOPIC_ROUTER_WORK};

/// Status of an execution or of a single node within it.
///
/// Executions are created as [`Running`](Self::Running) and move to exactly
/// one of the terminal states. Node states start as
/// [`Pending`](Self::Pending) and never become `Cancelled`.
///
/// Terminal states are absorbing: once an execution reaches one, no further
/// event mutates its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` for `Completed`, `Failed`, and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the variant of a node within a pipeline graph.
///
/// The coordinator only ever inspects a node's type: it chooses the dispatch
/// topic for `executor` and `router` nodes, completes the execution on `end`,
/// and skips through `start`. Per-variant configuration is opaque and is
/// carried to workers untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Start,
    Executor,
    Router,
    End,
}

impl NodeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Executor => "executor",
            Self::Router => "router",
            Self::End => "end",
        }
    }

    /// The work topic for this node type, or `None` for the virtual
    /// `start`/`end` variants which are handled inside the coordinator.
    ///
    /// This is the total dispatch map: every variant has exactly one row.
    #[must_use]
    pub fn work_topic(&self) -> Option<&'static str> {
        match self {
            Self::Executor => Some(TOPIC_EXECUTOR_WORK),
            Self::Router => Some(TOPIC_ROUTER_WORK),
            Self::Start | Self::End => None,
        }
    }

    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of envelopes published by the coordinator or its workers.
///
/// `node.work` and `node.completed` are the control protocol;
/// the `graph.*` and `node.started` types are informational events on the
/// `graph.events` topic and must never be used as a control channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "node.work")]
    NodeWork,
    #[serde(rename = "node.completed")]
    NodeCompleted,
    #[serde(rename = "node.started")]
    NodeStarted,
    #[serde(rename = "graph.submitted")]
    GraphSubmitted,
    #[serde(rename = "graph.completed")]
    GraphCompleted,
    #[serde(rename = "graph.failed")]
    GraphFailed,
    #[serde(rename = "graph.cancelled")]
    GraphCancelled,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeWork => "node.work",
            Self::NodeCompleted => "node.completed",
            Self::NodeStarted => "node.started",
            Self::GraphSubmitted => "graph.submitted",
            Self::GraphCompleted => "graph.completed",
            Self::GraphFailed => "graph.failed",
            Self::GraphCancelled => "graph.cancelled",
        }
    }

    /// The informational event emitted when an execution reaches `status`.
    ///
    /// Returns `None` for non-terminal statuses.
    #[must_use]
    pub fn for_terminal(status: ExecutionStatus) -> Option<Self> {
        match status {
            ExecutionStatus::Completed => Some(Self::GraphCompleted),
            ExecutionStatus::Failed => Some(Self::GraphFailed),
            ExecutionStatus::Cancelled => Some(Self::GraphCancelled),
            ExecutionStatus::Pending | ExecutionStatus::Running => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
