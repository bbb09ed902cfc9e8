//! The cache orchestration facade.

use crate::config::CacheConfig;
use crate::health::HealthMonitor;
use crate::invalidation::InvalidationService;
use crate::offline::OfflineService;
use crate::warming::{IdlePolicy, WarmingService};
use parking_lot::Mutex;
use spintrack_store::{DurableStorage, QueryStore};
use spintrack_utils::Clock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns and wires the orchestration services over one query store.
///
/// Embedders construct one manager per store, keep it for the life of the
/// session, and call [`CacheManager::shutdown`] on teardown.
pub struct CacheManager {
    store: Arc<dyn QueryStore>,
    config: CacheConfig,
    invalidation: Arc<InvalidationService>,
    warming: Arc<WarmingService>,
    offline: Arc<OfflineService>,
    health: Arc<HealthMonitor>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheManager {
    pub fn new(
        store: Arc<dyn QueryStore>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn DurableStorage>,
        config: CacheConfig,
    ) -> Self {
        let invalidation = Arc::new(InvalidationService::new(
            store.clone(),
            clock.clone(),
            config.clone(),
        ));
        let warming = Arc::new(WarmingService::new(
            store.clone(),
            clock.clone(),
            config.clone(),
        ));
        let offline = Arc::new(OfflineService::new(
            store.clone(),
            storage,
            clock,
            config.clone(),
        ));
        let health = Arc::new(HealthMonitor::new(
            store.clone(),
            offline.clone(),
            config.clone(),
        ));
        Self {
            store,
            config,
            invalidation,
            warming,
            offline,
            health,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn QueryStore> {
        &self.store
    }

    pub fn invalidation(&self) -> &Arc<InvalidationService> {
        &self.invalidation
    }

    pub fn warming(&self) -> &Arc<WarmingService> {
        &self.warming
    }

    pub fn offline(&self) -> &Arc<OfflineService> {
        &self.offline
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Start the periodic loops: health polling and idle warming. The idle
    /// loop follows the offline layer's connectivity and sits out while the
    /// app is offline.
    pub fn start_background_tasks(&self, idle_policy: Arc<dyn IdlePolicy>) {
        let mut tasks = self.tasks.lock();
        tasks.push(self.health.spawn_poller());
        tasks.push(
            self.warming
                .spawn_idle_warming(idle_policy, self.offline.watch_online()),
        );
        info!("cache background tasks started");
    }

    /// Refresh what went stale while the app was in the background.
    ///
    /// Essential-tier entries are refetched before returning; the rest is
    /// refetched after a short delay and capped so a long-backgrounded app
    /// does not refetch the world at once.
    pub async fn handle_visibility_change(&self, visible: bool) {
        if !visible {
            return;
        }
        let stale: Vec<_> = self
            .store
            .entries()
            .into_iter()
            .filter(|entry| entry.is_stale)
            .map(|entry| entry.key)
            .collect();
        if stale.is_empty() {
            return;
        }

        let (essential, rest): (Vec<_>, Vec<_>) = stale
            .into_iter()
            .partition(|key| {
                key.contains_segment("essential")
                    || key.segments().first().is_some_and(|s| s.as_str() == "session")
            });

        info!(
            essential = essential.len(),
            deferred = rest.len().min(self.config.visibility_refetch_cap),
            "refreshing stale entries after visibility change"
        );
        for key in &essential {
            if let Err(e) = self.store.refetch(key).await {
                warn!(key = %key, error = %e, "visibility refetch failed");
            }
        }

        let capped: Vec<_> = rest
            .into_iter()
            .take(self.config.visibility_refetch_cap)
            .collect();
        if capped.is_empty() {
            return;
        }
        let store = self.store.clone();
        let offline = self.offline.clone();
        let delay = self.config.visibility_refetch_delay;
        self.tasks.lock().push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !offline.is_online() {
                debug!(skipped = capped.len(), "deferred visibility refetch suspended while offline");
                return;
            }
            for key in &capped {
                if let Err(e) = store.refetch(key).await {
                    warn!(key = %key, error = %e, "deferred visibility refetch failed");
                }
            }
        }));
    }

    /// Connectivity transitions, delegated to the offline layer.
    pub async fn handle_connectivity(&self, online: bool) {
        self.offline.handle_connectivity(online).await;
    }

    /// Abort background loops and pending invalidation timers.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.invalidation.shutdown();
        info!("cache manager shut down");
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
