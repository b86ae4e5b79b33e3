use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Vertical;
use crate::Result;

/// One cache slot: an opaque payload plus the metadata expiry and vertical
/// checks are computed from. Expiry is evaluated at read time; entries are
/// never actively swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub vertical: Vertical,
}

impl CacheEntry {
    pub fn new(payload: serde_json::Value, vertical: Vertical) -> Self {
        Self {
            payload,
            stored_at: Utc::now(),
            vertical,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.stored_at
    }
}

/// Key-value persistence boundary. Backends are swappable (in-memory map,
/// JSON file, a real database) without touching orchestration logic.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Unconditional overwrite; no merge semantics.
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Full listing, for summary/readiness queries.
    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>>;
}
