//! Connectivity state, retry queue, and offline serving.

use super::fallback::FallbackStore;
use crate::config::CacheConfig;
use parking_lot::Mutex;
use serde_json::Value;
use spintrack_core::{Error, QueryKey, Result};
use spintrack_store::{DurableStorage, QueryStore};
use spintrack_utils::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Summary of the offline layer for status surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineStatus {
    pub is_online: bool,
    pub queued_retries: usize,
    pub fallback_snapshots: usize,
    pub offline_served: u64,
}

pub struct OfflineService {
    pub(super) store: Arc<dyn QueryStore>,
    pub(super) fallback: FallbackStore,
    pub(super) config: CacheConfig,
    online: watch::Sender<bool>,
    /// Keys awaiting replay, deduplicated by canonical form.
    retry_queue: Mutex<Vec<QueryKey>>,
    offline_served: AtomicU64,
}

impl OfflineService {
    pub fn new(
        store: Arc<dyn QueryStore>,
        storage: Arc<dyn DurableStorage>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        let (online, _) = watch::channel(true);
        let fallback = FallbackStore::new(storage, clock, config.fallback_ttl_ms);
        Self {
            store,
            fallback,
            config,
            online,
            retry_queue: Mutex::new(Vec::new()),
            offline_served: AtomicU64::new(0),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Watch connectivity transitions. Background refresh loops pause while
    /// the value is `false`.
    pub fn watch_online(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Record connectivity without side effects.
    pub fn set_online(&self, online: bool) {
        self.online.send_if_modified(|state| {
            let changed = *state != online;
            *state = online;
            changed
        });
    }

    /// Apply a connectivity transition. Coming back online replays the
    /// queued reads.
    pub async fn handle_connectivity(&self, online: bool) {
        let was_online = self.is_online();
        self.set_online(online);
        if online && !was_online {
            info!("connection restored, replaying queued reads");
            self.replay_queued().await;
        } else if !online && was_online {
            info!("connection lost, serving from cache and fallbacks");
        }
    }

    /// Queue a key for replay when connectivity returns. Idempotent per key.
    pub fn queue_for_retry(&self, key: &QueryKey) {
        let mut queue = self.retry_queue.lock();
        if !queue.iter().any(|queued| queued == key) {
            debug!(key = %key, "queued for retry after reconnect");
            queue.push(key.clone());
        }
    }

    pub fn queued_retries(&self) -> usize {
        self.retry_queue.lock().len()
    }

    /// Drain the retry queue in small concurrent batches with a pause
    /// between batches, so reconnect does not stampede the backend.
    pub async fn replay_queued(&self) {
        let queued: Vec<QueryKey> = std::mem::take(&mut *self.retry_queue.lock());
        if queued.is_empty() {
            return;
        }
        info!(count = queued.len(), "replaying queued reads");
        let mut batches = queued.chunks(self.config.replay_batch_size).peekable();
        while let Some(batch) = batches.next() {
            futures::future::join_all(batch.iter().map(|key| async move {
                if let Err(e) = self.store.refetch(key).await {
                    warn!(key = %key, error = %e, "queued replay failed");
                }
            }))
            .await;
            if batches.peek().is_some() {
                tokio::time::sleep(self.config.replay_batch_delay).await;
            }
        }
    }

    /// Best-available value while offline: the live store entry, else a
    /// valid fallback snapshot (annotated, re-inserted, and flagged
    /// offline in the store).
    pub async fn serve_offline_data(&self, key: &QueryKey) -> Result<Value> {
        if let Some(value) = self.store.get(key).await {
            return Ok(value);
        }
        match self.fallback.fallback(key) {
            Some(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.insert("_isOfflineData".to_owned(), Value::Bool(true));
                }
                self.store.set(key, value.clone()).await;
                self.store.mark_offline(key).await;
                self.offline_served.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "served from fallback snapshot");
                Ok(value)
            }
            None => Err(Error::offline_unavailable(key.canonical())),
        }
    }

    /// Persist a snapshot for later offline use.
    pub fn store_fallback(&self, key: &QueryKey, value: &Value, ttl_ms: Option<i64>) -> Result<()> {
        self.fallback.store_fallback(key, value, ttl_ms)
    }

    pub fn cleanup_expired_fallbacks(&self) -> usize {
        self.fallback.cleanup_expired()
    }

    pub fn offline_status(&self) -> OfflineStatus {
        OfflineStatus {
            is_online: self.is_online(),
            queued_retries: self.queued_retries(),
            fallback_snapshots: self.fallback.snapshot_count(),
            offline_served: self.offline_served.load(Ordering::Relaxed),
        }
    }

    /// Full resync once connectivity is back: mark everything stale and
    /// drain the retry queue. A no-op while offline.
    pub async fn force_sync_when_online(&self) {
        if !self.is_online() {
            debug!("force sync skipped while offline");
            return;
        }
        for snapshot in self.store.entries() {
            if let Err(e) = self.store.invalidate(&snapshot.key).await {
                warn!(key = %snapshot.key, error = %e, "force sync invalidation failed");
            }
        }
        self.replay_queued().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{counting_store, key, CountingStore};
    use serde_json::json;
    use spintrack_store::MemoryStorage;
    use spintrack_utils::ManualClock;
    use std::time::Duration;

    fn service() -> (Arc<OfflineService>, Arc<CountingStore>) {
        let (store, counts) = counting_store();
        let service = OfflineService::new(
            store,
            Arc::new(MemoryStorage::new()),
            ManualClock::new(50_000),
            CacheConfig::default(),
        );
        (Arc::new(service), counts)
    }

    #[tokio::test]
    async fn live_value_wins_over_fallback() {
        let (service, counts) = service();
        let k = key(&["dashboard", "essential", "summary"]);
        counts.seed_value(&k, json!({"live": true}));
        service.store_fallback(&k, &json!({"live": false}), None).unwrap();

        let value = service.serve_offline_data(&k).await.unwrap();
        assert_eq!(value, json!({"live": true}));
        assert_eq!(service.offline_status().offline_served, 0);
    }

    #[tokio::test]
    async fn fallback_is_annotated_and_reinserted() {
        let (service, counts) = service();
        let k = key(&["dashboard", "essential", "summary"]);
        service.store_fallback(&k, &json!({"spins": 7}), None).unwrap();

        let value = service.serve_offline_data(&k).await.unwrap();
        assert_eq!(value, json!({"spins": 7, "_isOfflineData": true}));
        assert_eq!(counts.entries().iter().filter(|s| s.is_offline).count(), 1);
        assert_eq!(service.offline_status().offline_served, 1);
    }

    #[tokio::test]
    async fn missing_everywhere_is_offline_unavailable() {
        let (service, _counts) = service();
        let err = service
            .serve_offline_data(&key(&["realtime", "spins"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OfflineUnavailable { .. }));
    }

    #[tokio::test]
    async fn retry_queue_dedupes_by_key() {
        let (service, _counts) = service();
        let k = key(&["dashboard", "essential", "metrics"]);
        service.queue_for_retry(&k);
        service.queue_for_retry(&k);
        service.queue_for_retry(&key(&["realtime", "spins"]));
        assert_eq!(service.queued_retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_replays_in_spaced_batches() {
        let (service, counts) = service();
        service.set_online(false);
        for i in 0..7 {
            let segment = format!("widget-{i}");
            service.queue_for_retry(&key(&["dashboard", "secondary", segment.as_str()]));
        }

        let replaying = {
            let service = service.clone();
            tokio::spawn(async move { service.handle_connectivity(true).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(counts.refetched_keys().len(), 3);

        tokio::time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(counts.refetched_keys().len(), 6);

        tokio::time::advance(Duration::from_millis(500)).await;
        replaying.await.unwrap();
        assert_eq!(counts.refetched_keys().len(), 7);
        assert_eq!(service.queued_retries(), 0);
    }

    #[tokio::test]
    async fn repeated_offline_transitions_do_not_replay() {
        let (service, counts) = service();
        service.queue_for_retry(&key(&["realtime", "spins"]));

        // Already online, no transition: queue stays put.
        service.handle_connectivity(true).await;
        assert!(counts.refetched_keys().is_empty());
        assert_eq!(service.queued_retries(), 1);
    }

    #[tokio::test]
    async fn force_sync_invalidates_and_drains() {
        let (service, counts) = service();
        counts.seed_entry(key(&["dashboard", "essential", "summary"]), 40_000);
        service.queue_for_retry(&key(&["realtime", "spins"]));

        service.force_sync_when_online().await;
        assert_eq!(counts.invalidations(), 1);
        assert_eq!(counts.refetched_keys().len(), 1);
        assert_eq!(service.queued_retries(), 0);
    }
}
