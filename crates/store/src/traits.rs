//! The consumed query store contract.

use async_trait::async_trait;
use serde_json::Value;
use spintrack_core::{EntrySnapshot, QueryKey, Result};
use tokio::sync::broadcast;

/// How the store populates entries. Implemented by the application's data
/// layer (REST wrappers, in tests a fake counting fetches).
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> Result<Value>;
}

/// Change feed emitted by the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Entry value updated (fetch or explicit set)
    Updated { key: QueryKey },
    /// Entry marked stale
    Invalidated { key: QueryKey },
    /// Entry removed
    Removed { key: QueryKey },
    /// A fetch for the key failed
    FetchFailed { key: QueryKey },
}

/// The key-value query cache the orchestrators coordinate.
///
/// The store owns entry lifecycle (status, staleness, timestamps); the
/// orchestration layer only drives it through these operations.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Cached value for the key, if any.
    async fn get(&self, key: &QueryKey) -> Option<Value>;

    /// Write a value directly, marking the entry fresh and successful.
    async fn set(&self, key: &QueryKey, value: Value);

    /// Remove the entry for the key.
    async fn remove(&self, key: &QueryKey);

    /// Remove every entry whose key starts with the prefix.
    async fn remove_prefix(&self, prefix: &QueryKey);

    /// Mark the entry stale so consumers refetch on next access.
    async fn invalidate(&self, key: &QueryKey) -> Result<()>;

    /// Mark every entry in the key family stale.
    async fn invalidate_prefix(&self, prefix: &QueryKey) -> Result<()>;

    /// Fetch the key now and update the entry, returning the fresh value.
    async fn refetch(&self, key: &QueryKey) -> Result<Value>;

    /// Populate the entry ahead of need. A no-op when the cached value is
    /// younger than `stale_time_ms`.
    async fn prefetch(&self, key: &QueryKey, stale_time_ms: i64) -> Result<()>;

    /// Flag the entry as served from offline fallback storage.
    async fn mark_offline(&self, key: &QueryKey);

    /// Snapshot of every entry currently in the store.
    fn entries(&self) -> Vec<EntrySnapshot>;

    /// Subscribe to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
