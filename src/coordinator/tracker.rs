//! Process-local tracking of active executions.
//!
//! The tracker is not authoritative — the store is — but it owns each
//! active execution's cancellation token, which terminates the deadline
//! supervisor when fired. Entries are inserted at submission and removed on
//! terminal transitions.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::types::ExecutionStatus;

#[derive(Debug, Clone)]
struct TrackedExecution {
    status: ExecutionStatus,
    submitted_at: DateTime<Utc>,
    cancel: CancellationToken,
}

/// Concurrent map from execution id to its in-process supervision handle.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    entries: Mutex<FxHashMap<String, TrackedExecution>>,
}

impl ExecutionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        execution_id: impl Into<String>,
        submitted_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) {
        self.entries.lock().expect("tracker poisoned").insert(
            execution_id.into(),
            TrackedExecution {
                status: ExecutionStatus::Running,
                submitted_at,
                cancel,
            },
        );
    }

    /// Removes an entry and fires its cancel handle. Returns `false` when
    /// the execution was not tracked (e.g. already terminal, or owned by
    /// another process).
    pub fn remove(&self, execution_id: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .expect("tracker poisoned")
            .remove(execution_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, execution_id: &str) -> bool {
        self.entries
            .lock()
            .expect("tracker poisoned")
            .contains_key(execution_id)
    }

    #[must_use]
    pub fn status(&self, execution_id: &str) -> Option<ExecutionStatus> {
        self.entries
            .lock()
            .expect("tracker poisoned")
            .get(execution_id)
            .map(|entry| entry.status)
    }

    #[must_use]
    pub fn submitted_at(&self, execution_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .expect("tracker poisoned")
            .get(execution_id)
            .map(|entry| entry.submitted_at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("tracker poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fires every tracked cancel handle without removing entries; used on
    /// shutdown, where records are deliberately left untouched.
    pub fn cancel_all(&self) {
        let entries = self.entries.lock().expect("tracker poisoned");
        for entry in entries.values() {
            entry.cancel.cancel();
        }
    }
}
