//! Window-coalesced batch invalidation.

use super::InvalidationService;
use spintrack_core::QueryKey;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Shared pending set for the current batch window.
#[derive(Default)]
pub(super) struct BatchState {
    /// Keyed by canonical form so duplicates collapse.
    pending: HashMap<String, QueryKey>,
    timer_armed: bool,
}

impl BatchState {
    pub(super) fn clear(&mut self) {
        self.pending.clear();
        self.timer_armed = false;
    }
}

impl InvalidationService {
    /// Add keys to the shared batch. The first key of a window arms a fixed
    /// timer; keys arriving while it runs join the same pass without
    /// extending the deadline. One invalidation pass covers the whole set.
    pub fn batch_invalidate(&self, keys: &[QueryKey]) {
        if keys.is_empty() {
            return;
        }

        let arm = {
            let mut batch = self.batch.lock();
            for key in keys {
                batch.pending.insert(key.canonical(), key.clone());
            }
            if batch.timer_armed {
                false
            } else {
                batch.timer_armed = true;
                true
            }
        };

        if !arm {
            return;
        }

        let store = self.store.clone();
        let state = self.batch.clone();
        let window = self.config.batch_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let drained: Vec<QueryKey> = {
                let mut batch = state.lock();
                batch.timer_armed = false;
                batch.pending.drain().map(|(_, k)| k).collect()
            };
            debug!(count = drained.len(), "executing batch invalidation");
            for key in drained {
                if let Err(e) = store.invalidate(&key).await {
                    warn!(key = %key, error = %e, "batch invalidation failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CacheConfig;
    use crate::invalidation::InvalidationService;
    use crate::testutil::{counting_store, key};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn window_coalesces_into_one_pass() {
        let (store, counts) = counting_store();
        let svc = InvalidationService::new(
            store,
            spintrack_utils::ManualClock::new(0),
            CacheConfig::default(),
        );

        svc.batch_invalidate(&[key(&["k1"])]);
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(30)).await;
        svc.batch_invalidate(&[key(&["k2"])]);

        tokio::time::advance(Duration::from_millis(80)).await;
        tokio::task::yield_now().await;

        let invalidated = counts.invalidated_keys();
        assert_eq!(invalidated.len(), 2);
        assert!(invalidated.contains(&key(&["k1"])));
        assert!(invalidated.contains(&key(&["k2"])));
    }

    #[tokio::test(start_paused = true)]
    async fn window_does_not_extend() {
        let (store, counts) = counting_store();
        let svc = InvalidationService::new(
            store,
            spintrack_utils::ManualClock::new(0),
            CacheConfig::default(),
        );

        svc.batch_invalidate(&[key(&["k1"])]);
        tokio::task::yield_now().await;
        // keep adding keys right up to the deadline
        for i in 0..9 {
            tokio::time::advance(Duration::from_millis(10)).await;
            let segment = format!("k{}", i + 2);
            svc.batch_invalidate(&[key(&[segment.as_str()])]);
        }

        // deadline is 100ms after the FIRST key, not the last
        tokio::time::advance(Duration::from_millis(15)).await;
        tokio::task::yield_now().await;
        assert_eq!(counts.invalidated_keys().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_keys_collapse() {
        let (store, counts) = counting_store();
        let svc = InvalidationService::new(
            store,
            spintrack_utils::ManualClock::new(0),
            CacheConfig::default(),
        );

        svc.batch_invalidate(&[key(&["k1"]), key(&["k1"])]);
        svc.batch_invalidate(&[key(&["k1"])]);

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(120)).await;
        tokio::task::yield_now().await;
        assert_eq!(counts.invalidated_keys().len(), 1);
    }
}
