//! Test doubles shared by the unit tests in this crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use spintrack_core::{EntrySnapshot, EntryStatus, QueryKey, Result};
use spintrack_store::{QueryStore, StoreEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Records every operation the orchestrators perform against the store.
pub struct CountingStore {
    snapshots: Mutex<Vec<EntrySnapshot>>,
    values: Mutex<HashMap<String, Value>>,
    invalidated: Mutex<Vec<QueryKey>>,
    prefix_invalidated: Mutex<Vec<QueryKey>>,
    refetched: Mutex<Vec<QueryKey>>,
    prefetched: Mutex<Vec<QueryKey>>,
    refetch_failure: Mutex<Option<u16>>,
    events: broadcast::Sender<StoreEvent>,
}

impl CountingStore {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            snapshots: Mutex::new(Vec::new()),
            values: Mutex::new(HashMap::new()),
            invalidated: Mutex::new(Vec::new()),
            prefix_invalidated: Mutex::new(Vec::new()),
            refetched: Mutex::new(Vec::new()),
            prefetched: Mutex::new(Vec::new()),
            refetch_failure: Mutex::new(None),
            events,
        }
    }

    pub fn seed_snapshot(&self, snapshot: EntrySnapshot) {
        self.snapshots.lock().push(snapshot);
    }

    pub fn seed_entry(&self, key: QueryKey, data_updated_at: i64) {
        self.snapshots.lock().push(EntrySnapshot {
            key,
            status: EntryStatus::Success,
            is_stale: false,
            data_updated_at,
            error_updated_at: 0,
            is_offline: false,
        });
    }

    pub fn seed_stale_entry(&self, key: QueryKey) {
        self.snapshots.lock().push(EntrySnapshot {
            key,
            status: EntryStatus::Success,
            is_stale: true,
            data_updated_at: 0,
            error_updated_at: 0,
            is_offline: false,
        });
    }

    pub fn seed_value(&self, key: &QueryKey, value: Value) {
        self.values.lock().insert(key.canonical(), value);
    }

    pub fn invalidations(&self) -> usize {
        self.invalidated.lock().len()
    }

    pub fn invalidated_keys(&self) -> Vec<QueryKey> {
        self.invalidated.lock().clone()
    }

    pub fn prefix_invalidations(&self) -> usize {
        self.prefix_invalidated.lock().len()
    }

    pub fn refetched_keys(&self) -> Vec<QueryKey> {
        self.refetched.lock().clone()
    }

    pub fn prefetched_keys(&self) -> Vec<QueryKey> {
        self.prefetched.lock().clone()
    }

    /// Make every subsequent refetch fail with the given HTTP status.
    pub fn fail_refetches_with_status(&self, status: u16) {
        *self.refetch_failure.lock() = Some(status);
    }
}

#[async_trait]
impl QueryStore for CountingStore {
    async fn get(&self, key: &QueryKey) -> Option<Value> {
        self.values.lock().get(&key.canonical()).cloned()
    }

    async fn set(&self, key: &QueryKey, value: Value) {
        self.values.lock().insert(key.canonical(), value);
        let exists = self.snapshots.lock().iter().any(|s| &s.key == key);
        if !exists {
            self.seed_entry(key.clone(), 0);
        }
    }

    async fn remove(&self, key: &QueryKey) {
        self.values.lock().remove(&key.canonical());
        self.snapshots.lock().retain(|s| &s.key != key);
    }

    async fn remove_prefix(&self, prefix: &QueryKey) {
        self.snapshots.lock().retain(|s| !s.key.starts_with(prefix));
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        self.invalidated.lock().push(key.clone());
        for snapshot in self.snapshots.lock().iter_mut() {
            if &snapshot.key == key {
                snapshot.is_stale = true;
            }
        }
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &QueryKey) -> Result<()> {
        self.prefix_invalidated.lock().push(prefix.clone());
        for snapshot in self.snapshots.lock().iter_mut() {
            if snapshot.key.starts_with(prefix) {
                snapshot.is_stale = true;
            }
        }
        Ok(())
    }

    async fn refetch(&self, key: &QueryKey) -> Result<Value> {
        self.refetched.lock().push(key.clone());
        if let Some(status) = *self.refetch_failure.lock() {
            return Err(spintrack_core::Error::from_status(
                status,
                "induced refetch failure",
            ));
        }
        for snapshot in self.snapshots.lock().iter_mut() {
            if &snapshot.key == key {
                snapshot.is_stale = false;
            }
        }
        Ok(json!({ "refetched": key.canonical() }))
    }

    async fn prefetch(&self, key: &QueryKey, _stale_time_ms: i64) -> Result<()> {
        self.prefetched.lock().push(key.clone());
        // Suspend once so concurrent warming passes genuinely overlap in
        // tests; a real store always has an await point here.
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn mark_offline(&self, key: &QueryKey) {
        for snapshot in self.snapshots.lock().iter_mut() {
            if &snapshot.key == key {
                snapshot.is_offline = true;
            }
        }
    }

    fn entries(&self) -> Vec<EntrySnapshot> {
        self.snapshots.lock().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

pub fn counting_store() -> (Arc<dyn QueryStore>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new());
    (store.clone() as Arc<dyn QueryStore>, store)
}

pub fn key(segments: &[&str]) -> QueryKey {
    QueryKey::new(segments.iter().copied()).expect("test key")
}
