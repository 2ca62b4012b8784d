//! Durable state-store contract.
//!
//! The coordinator treats the store as the single source of truth for
//! execution records: a key/value interface with TTL, keyed by execution id.
//! Records are serialized as self-describing JSON documents; any backend
//! with round-trip fidelity qualifies. Concrete production stores (Redis in
//! the reference deployment) live outside this crate.

mod memory;

pub use memory::InMemoryStateStore;

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::state::ExecutionRecord;

/// Store-level failure.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("state not found: {execution_id}")]
    #[diagnostic(code(dagflow::store::not_found))]
    NotFound { execution_id: String },

    #[error("failed to serialize execution record: {source}")]
    #[diagnostic(code(dagflow::store::serialize))]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize execution record: {source}")]
    #[diagnostic(code(dagflow::store::deserialize))]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend error: {0}")]
    #[diagnostic(code(dagflow::store::backend))]
    Backend(String),
}

impl StoreError {
    /// Whether this error is the record simply not being there.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Key/value + TTL persistence contract for execution records.
///
/// Every `save` (re)applies the store's configured TTL, after which the
/// backend may evict the record; the coordinator itself never deletes
/// records on terminal transitions.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    async fn load(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError>;

    async fn delete(&self, execution_id: &str) -> Result<(), StoreError>;

    async fn exists(&self, execution_id: &str) -> Result<bool, StoreError>;

    /// Overrides the remaining TTL of an existing record.
    async fn set_ttl(&self, execution_id: &str, ttl: Duration) -> Result<(), StoreError>;

    /// All stored execution ids. Used only for administrative scans and
    /// deadline resurrection at startup; eventual consistency is acceptable.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}
