//! Durable fallback snapshots.
//!
//! Successful reads of durable data are mirrored into [`DurableStorage`] so
//! an offline session can still render something. Snapshots carry their own
//! TTL and are evicted lazily on access plus a periodic sweep.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spintrack_core::{Error, QueryKey, Result};
use spintrack_store::DurableStorage;
use spintrack_utils::Clock;
use std::sync::Arc;
use tracing::{debug, warn};

const STORAGE_PREFIX: &str = "spintrack-fallback:";

#[derive(Debug, Serialize, Deserialize)]
struct FallbackRecord {
    value: Value,
    stored_at: i64,
    ttl_ms: i64,
}

pub struct FallbackStore {
    storage: Arc<dyn DurableStorage>,
    clock: Arc<dyn Clock>,
    default_ttl_ms: i64,
}

impl FallbackStore {
    pub fn new(storage: Arc<dyn DurableStorage>, clock: Arc<dyn Clock>, default_ttl_ms: i64) -> Self {
        Self {
            storage,
            clock,
            default_ttl_ms,
        }
    }

    fn storage_key(key: &QueryKey) -> String {
        format!("{STORAGE_PREFIX}{}", key.canonical())
    }

    /// Persist a snapshot under the key's canonical form.
    pub fn store_fallback(&self, key: &QueryKey, value: &Value, ttl_ms: Option<i64>) -> Result<()> {
        let record = FallbackRecord {
            value: value.clone(),
            stored_at: self.clock.now_ms(),
            ttl_ms: ttl_ms.unwrap_or(self.default_ttl_ms),
        };
        let serialized = serde_json::to_string(&record)
            .map_err(|e| Error::serialization("fallback record encode failed", e))?;
        self.storage.set(&Self::storage_key(key), &serialized)
    }

    /// The stored snapshot, if present and within its TTL. Expired and
    /// unreadable snapshots are evicted on the spot.
    pub fn fallback(&self, key: &QueryKey) -> Option<Value> {
        let storage_key = Self::storage_key(key);
        let raw = self.storage.get(&storage_key)?;
        let record: FallbackRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unreadable fallback snapshot");
                self.storage.remove(&storage_key);
                return None;
            }
        };
        if self.clock.now_ms() - record.stored_at > record.ttl_ms {
            debug!(key = %key, "fallback snapshot expired");
            self.storage.remove(&storage_key);
            return None;
        }
        Some(record.value)
    }

    pub fn remove(&self, key: &QueryKey) {
        self.storage.remove(&Self::storage_key(key));
    }

    /// Sweep every snapshot and evict the expired ones. Returns the number
    /// evicted.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut evicted = 0;
        for storage_key in self.storage.keys() {
            if !storage_key.starts_with(STORAGE_PREFIX) {
                continue;
            }
            let expired = match self.storage.get(&storage_key) {
                Some(raw) => match serde_json::from_str::<FallbackRecord>(&raw) {
                    Ok(record) => now - record.stored_at > record.ttl_ms,
                    Err(_) => true,
                },
                None => continue,
            };
            if expired {
                self.storage.remove(&storage_key);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "fallback cleanup evicted expired snapshots");
        }
        evicted
    }

    /// Number of snapshots currently held.
    pub fn snapshot_count(&self) -> usize {
        self.storage
            .keys()
            .iter()
            .filter(|k| k.starts_with(STORAGE_PREFIX))
            .count()
    }
}
