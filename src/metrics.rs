//! Telemetry counters boundary.
//!
//! The coordinator reports submission and completion counters through
//! [`MetricsSink`]; the concrete exporter (Prometheus in the reference
//! deployment) is an external collaborator. [`NoopMetrics`] is the default;
//! [`CountingMetrics`] accumulates into atomics for assertions in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::{ExecutionStatus, NodeType};

/// Outcome of a submission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The graph passed validation and a record was persisted.
    Accepted,
    /// The graph was rejected at the admission gate.
    Rejected,
}

/// Counter sink the coordinator reports into.
pub trait MetricsSink: Send + Sync {
    fn record_graph_submitted(&self, outcome: SubmissionOutcome);

    fn record_graph_completed(&self, status: ExecutionStatus, elapsed: Duration);

    fn record_node_dispatched(&self, node_type: NodeType);
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_graph_submitted(&self, _outcome: SubmissionOutcome) {}

    fn record_graph_completed(&self, _status: ExecutionStatus, _elapsed: Duration) {}

    fn record_node_dispatched(&self, _node_type: NodeType) {}
}

/// Accumulating sink for tests.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    submissions_accepted: AtomicU64,
    submissions_rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    nodes_dispatched: AtomicU64,
}

impl CountingMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn submissions_accepted(&self) -> u64 {
        self.submissions_accepted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn submissions_rejected(&self) -> u64 {
        self.submissions_rejected.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn nodes_dispatched(&self) -> u64 {
        self.nodes_dispatched.load(Ordering::Relaxed)
    }
}

impl MetricsSink for CountingMetrics {
    fn record_graph_submitted(&self, outcome: SubmissionOutcome) {
        let counter = match outcome {
            SubmissionOutcome::Accepted => &self.submissions_accepted,
            SubmissionOutcome::Rejected => &self.submissions_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_graph_completed(&self, status: ExecutionStatus, _elapsed: Duration) {
        let counter = match status {
            ExecutionStatus::Completed => &self.completed,
            ExecutionStatus::Failed => &self.failed,
            ExecutionStatus::Cancelled => &self.cancelled,
            ExecutionStatus::Pending | ExecutionStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_node_dispatched(&self, _node_type: NodeType) {
        self.nodes_dispatched.fetch_add(1, Ordering::Relaxed);
    }
}
