//! Periodic cache health sampling.

use crate::config::CacheConfig;
use crate::offline::OfflineService;
use parking_lot::Mutex;
use spintrack_core::EntryStatus;
use spintrack_store::QueryStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Point-in-time view of cache health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatusSnapshot {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub pending: usize,
    pub stale: usize,
    pub offline_served: u64,
    pub queued_retries: usize,
    pub is_online: bool,
    /// 0-100. Errors weigh double, staleness half.
    pub health_score: f64,
}

impl CacheStatusSnapshot {
    /// Whether the change from `previous` is worth telling subscribers
    /// about. Score wobble below `score_delta` is noise.
    fn differs_significantly(&self, previous: &CacheStatusSnapshot, score_delta: f64) -> bool {
        self.is_online != previous.is_online
            || self.total != previous.total
            || self.error != previous.error
            || (self.health_score - previous.health_score).abs() > score_delta
    }
}

pub struct HealthMonitor {
    store: Arc<dyn QueryStore>,
    offline: Arc<OfflineService>,
    config: CacheConfig,
    last: Mutex<Option<CacheStatusSnapshot>>,
    updates: broadcast::Sender<CacheStatusSnapshot>,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn QueryStore>, offline: Arc<OfflineService>, config: CacheConfig) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            store,
            offline,
            config,
            last: Mutex::new(None),
            updates,
        }
    }

    /// Compute the current snapshot from store entries and offline state.
    pub fn snapshot(&self) -> CacheStatusSnapshot {
        let entries = self.store.entries();
        let total = entries.len();
        let mut success = 0;
        let mut error = 0;
        let mut pending = 0;
        let mut stale = 0;
        for entry in &entries {
            match entry.status {
                EntryStatus::Success => success += 1,
                EntryStatus::Error => error += 1,
                EntryStatus::Pending => pending += 1,
            }
            if entry.is_stale {
                stale += 1;
            }
        }

        let offline = self.offline.offline_status();
        CacheStatusSnapshot {
            total,
            success,
            error,
            pending,
            stale,
            offline_served: offline.offline_served,
            queued_retries: offline.queued_retries,
            is_online: offline.is_online,
            health_score: health_score(total, success, error, stale),
        }
    }

    /// Current snapshot, recording it and notifying subscribers when it
    /// changed significantly since the last poll.
    pub fn poll(&self) -> CacheStatusSnapshot {
        let snapshot = self.snapshot();
        let mut last = self.last.lock();
        let notify = match &*last {
            Some(previous) => {
                snapshot.differs_significantly(previous, self.config.health_score_delta)
            }
            None => true,
        };
        if notify {
            *last = Some(snapshot);
            if snapshot.health_score < 50.0 && snapshot.total > 0 {
                warn!(
                    score = snapshot.health_score,
                    errors = snapshot.error,
                    stale = snapshot.stale,
                    "cache health degraded"
                );
            }
            // No receivers is fine.
            let _ = self.updates.send(snapshot);
        } else {
            debug!(score = snapshot.health_score, "cache health unchanged");
        }
        snapshot
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheStatusSnapshot> {
        self.updates.subscribe()
    }

    /// Poll on the configured interval until aborted.
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.health_poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.poll();
            }
        })
    }
}

/// `success_rate − 2 × error_rate − 0.5 × stale_rate`, clamped to [0, 100].
/// An empty cache is healthy.
fn health_score(total: usize, success: usize, error: usize, stale: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let total = total as f64;
    let success_rate = success as f64 / total * 100.0;
    let error_rate = error as f64 / total * 100.0;
    let stale_rate = stale as f64 / total * 100.0;
    (success_rate - 2.0 * error_rate - 0.5 * stale_rate).clamp(0.0, 100.0)
}
