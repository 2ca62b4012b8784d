//! In-process state store.
//!
//! Records are kept as serialized JSON strings so every save/load pair
//! exercises the same round-trip a networked backend would. TTL is enforced
//! by lazy eviction: expired entries are dropped when next observed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::{StateStore, StoreError};
use crate::state::ExecutionRecord;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct StoredRecord {
    payload: String,
    expires_at: Instant,
}

impl StoredRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Map-backed store for tests and single-process deployments.
pub struct InMemoryStateStore {
    entries: Mutex<FxHashMap<String, StoredRecord>>,
    ttl: Duration,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// A store applying `ttl` on every save.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            ttl,
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(record).map_err(|source| StoreError::Serialize { source })?;
        let mut entries = self.entries.lock().expect("entries poisoned");
        entries.insert(
            record.execution_id.clone(),
            StoredRecord {
                payload,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn load(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError> {
        let mut entries = self.entries.lock().expect("entries poisoned");
        let now = Instant::now();
        match entries.get(execution_id) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(execution_id);
                Err(StoreError::NotFound {
                    execution_id: execution_id.to_string(),
                })
            }
            Some(stored) => serde_json::from_str(&stored.payload)
                .map_err(|source| StoreError::Deserialize { source }),
            None => Err(StoreError::NotFound {
                execution_id: execution_id.to_string(),
            }),
        }
    }

    async fn delete(&self, execution_id: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("entries poisoned")
            .remove(execution_id);
        Ok(())
    }

    async fn exists(&self, execution_id: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().expect("entries poisoned");
        let now = Instant::now();
        match entries.get(execution_id) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(execution_id);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn set_ttl(&self, execution_id: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("entries poisoned");
        match entries.get_mut(execution_id) {
            Some(stored) => {
                stored.expires_at = Instant::now() + ttl;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                execution_id: execution_id.to_string(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().expect("entries poisoned");
        let now = Instant::now();
        entries.retain(|_, stored| !stored.is_expired(now));
        Ok(entries.keys().cloned().collect())
    }
}
