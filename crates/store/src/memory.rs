//! Reference in-memory query store.

use crate::traits::{QueryFetcher, QueryStore, StoreEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use spintrack_core::{EntrySnapshot, EntryStatus, QueryKey, Result};
use spintrack_utils::Clock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Tunables for the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Entries older than this are reported stale.
    pub stale_after_ms: i64,
    /// Capacity of the change-feed channel.
    pub event_capacity: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: 5 * 60 * 1000,
            event_capacity: 256,
        }
    }
}

struct StoredEntry {
    key: QueryKey,
    value: Option<Value>,
    status: EntryStatus,
    invalidated: bool,
    data_updated_at: i64,
    error_updated_at: i64,
    is_offline: bool,
}

/// In-memory [`QueryStore`] keyed by the canonical key form.
///
/// Staleness is either explicit (invalidation) or age-based per
/// [`MemoryStoreConfig::stale_after_ms`]. Fetching goes through the injected
/// [`QueryFetcher`]; timestamps come from the injected [`Clock`].
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    fetcher: Arc<dyn QueryFetcher>,
    clock: Arc<dyn Clock>,
    config: MemoryStoreConfig,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new(
        fetcher: Arc<dyn QueryFetcher>,
        clock: Arc<dyn Clock>,
        config: MemoryStoreConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            entries: DashMap::new(),
            fetcher,
            clock,
            config,
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn is_stale(&self, entry: &StoredEntry, now: i64) -> bool {
        entry.invalidated
            || entry.data_updated_at == 0
            || now.saturating_sub(entry.data_updated_at) > self.config.stale_after_ms
    }

    fn snapshot(&self, entry: &StoredEntry, now: i64) -> EntrySnapshot {
        EntrySnapshot {
            key: entry.key.clone(),
            status: entry.status,
            is_stale: self.is_stale(entry, now),
            data_updated_at: entry.data_updated_at,
            error_updated_at: entry.error_updated_at,
            is_offline: entry.is_offline,
        }
    }
}

#[async_trait]
impl QueryStore for MemoryStore {
    async fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries
            .get(&key.canonical())
            .and_then(|e| e.value.clone())
    }

    async fn set(&self, key: &QueryKey, value: Value) {
        let now = self.clock.now_ms();
        self.entries.insert(
            key.canonical(),
            StoredEntry {
                key: key.clone(),
                value: Some(value),
                status: EntryStatus::Success,
                invalidated: false,
                data_updated_at: now,
                error_updated_at: 0,
                is_offline: false,
            },
        );
        self.emit(StoreEvent::Updated { key: key.clone() });
    }

    async fn remove(&self, key: &QueryKey) {
        if self.entries.remove(&key.canonical()).is_some() {
            self.emit(StoreEvent::Removed { key: key.clone() });
        }
    }

    async fn remove_prefix(&self, prefix: &QueryKey) {
        let removed: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|e| e.key.starts_with(prefix))
            .map(|e| e.key.clone())
            .collect();
        for key in removed {
            self.entries.remove(&key.canonical());
            self.emit(StoreEvent::Removed { key });
        }
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(&key.canonical()) {
            entry.invalidated = true;
        }
        self.emit(StoreEvent::Invalidated { key: key.clone() });
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &QueryKey) -> Result<()> {
        let matched: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|e| e.key.starts_with(prefix))
            .map(|e| e.key.clone())
            .collect();
        for key in matched {
            self.invalidate(&key).await?;
        }
        Ok(())
    }

    async fn refetch(&self, key: &QueryKey) -> Result<Value> {
        let canonical = key.canonical();
        if let Some(mut entry) = self.entries.get_mut(&canonical) {
            entry.status = EntryStatus::Pending;
        }

        match self.fetcher.fetch(key).await {
            Ok(value) => {
                let now = self.clock.now_ms();
                self.entries.insert(
                    canonical,
                    StoredEntry {
                        key: key.clone(),
                        value: Some(value.clone()),
                        status: EntryStatus::Success,
                        invalidated: false,
                        data_updated_at: now,
                        error_updated_at: 0,
                        is_offline: false,
                    },
                );
                self.emit(StoreEvent::Updated { key: key.clone() });
                Ok(value)
            }
            Err(e) => {
                let now = self.clock.now_ms();
                self.entries
                    .entry(canonical)
                    .and_modify(|entry| {
                        entry.status = EntryStatus::Error;
                        entry.error_updated_at = now;
                    })
                    .or_insert_with(|| StoredEntry {
                        key: key.clone(),
                        value: None,
                        status: EntryStatus::Error,
                        invalidated: false,
                        data_updated_at: 0,
                        error_updated_at: now,
                        is_offline: false,
                    });
                self.emit(StoreEvent::FetchFailed { key: key.clone() });
                Err(e)
            }
        }
    }

    async fn prefetch(&self, key: &QueryKey, stale_time_ms: i64) -> Result<()> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get(&key.canonical()) {
            let fresh = !entry.invalidated
                && entry.status == EntryStatus::Success
                && now.saturating_sub(entry.data_updated_at) < stale_time_ms;
            if fresh {
                debug!(key = %key, "prefetch skipped, entry still fresh");
                return Ok(());
            }
        }
        self.refetch(key).await.map(|_| ())
    }

    async fn mark_offline(&self, key: &QueryKey) {
        if let Some(mut entry) = self.entries.get_mut(&key.canonical()) {
            entry.is_offline = true;
        }
    }

    fn entries(&self) -> Vec<EntrySnapshot> {
        let now = self.clock.now_ms();
        self.entries.iter().map(|e| self.snapshot(&e, now)).collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spintrack_core::Error;
    use spintrack_utils::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct CountingFetcher {
        pub fetches: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl QueryFetcher for CountingFetcher {
        async fn fetch(&self, key: &QueryKey) -> Result<Value> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::server(500, "fetch failed"))
            } else {
                Ok(json!({ "key": key.canonical() }))
            }
        }
    }

    fn store(fail: bool) -> (MemoryStore, Arc<ManualClock>, Arc<CountingFetcher>) {
        let clock = ManualClock::new(1_000_000);
        let fetcher = Arc::new(CountingFetcher {
            fetches: AtomicUsize::new(0),
            fail,
        });
        (
            MemoryStore::new(fetcher.clone(), clock.clone(), MemoryStoreConfig::default()),
            clock,
            fetcher,
        )
    }

    #[tokio::test]
    async fn set_then_get() {
        let (store, _, _) = store(false);
        let key = QueryKey::of(["radios", "status"]);
        store.set(&key, json!({"online": 12})).await;
        assert_eq!(store.get(&key).await.unwrap(), json!({"online": 12}));
    }

    #[tokio::test]
    async fn invalidate_marks_stale() {
        let (store, _, _) = store(false);
        let key = QueryKey::of(["dashboard", "essential"]);
        store.set(&key, json!(1)).await;
        assert!(!store.entries()[0].is_stale);
        store.invalidate(&key).await.unwrap();
        assert!(store.entries()[0].is_stale);
    }

    #[tokio::test]
    async fn age_based_staleness() {
        let (store, clock, _) = store(false);
        let key = QueryKey::of(["dashboard", "essential"]);
        store.set(&key, json!(1)).await;
        clock.advance(6 * 60 * 1000);
        assert!(store.entries()[0].is_stale);
    }

    #[tokio::test]
    async fn prefetch_skips_fresh_entries() {
        let (store, _, fetcher) = store(false);
        let key = QueryKey::of(["static", "genres"]);
        store.refetch(&key).await.unwrap();
        store.prefetch(&key, 60_000).await.unwrap();

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refetch_records_error_status() {
        let (store, _, _) = store(true);
        let key = QueryKey::of(["radios", "status"]);
        assert!(store.refetch(&key).await.is_err());
        let entry = &store.entries()[0];
        assert_eq!(entry.status, EntryStatus::Error);
        assert!(entry.error_updated_at > 0);
    }

    #[tokio::test]
    async fn remove_prefix_clears_the_family() {
        let (store, _, _) = store(false);
        store.set(&QueryKey::of(["user", "profile", "U1"]), json!(1)).await;
        store.set(&QueryKey::of(["user", "preferences", "U1"]), json!(2)).await;
        store.set(&QueryKey::of(["dashboard", "essential"]), json!(3)).await;

        store.remove_prefix(&QueryKey::of(["user"])).await;
        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].key.starts_with(&QueryKey::of(["dashboard"])));
    }
}
