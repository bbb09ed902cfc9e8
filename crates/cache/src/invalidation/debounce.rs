//! Debounced single-key invalidation.

use super::InvalidationService;
use spintrack_core::QueryKey;
use std::time::Duration;
use tracing::{debug, warn};

impl InvalidationService {
    /// Invalidate `key` after `delay`, superseding any pending timer for the
    /// same key (latest wins). `force` invalidates immediately.
    ///
    /// The abort-and-replace happens in one synchronous section per key, so
    /// at most one timer is ever pending for a key.
    pub async fn invalidate_debounced(&self, key: &QueryKey, delay: Option<Duration>, force: bool) {
        if force {
            if let Some((_, timer)) = self.debounce_timers.remove(&key.canonical()) {
                timer.abort();
            }
            if let Err(e) = self.store.invalidate(key).await {
                warn!(key = %key, error = %e, "forced invalidation failed");
            }
            return;
        }

        let delay = delay.unwrap_or(self.config.debounce_delay);
        let canonical = key.canonical();
        let store = self.store.clone();
        let fired_key = key.clone();
        let timers = self.debounce_timers.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(key = %fired_key, "debounced invalidation firing");
            if let Err(e) = store.invalidate(&fired_key).await {
                warn!(key = %fired_key, error = %e, "debounced invalidation failed");
            }
            timers.remove(&fired_key.canonical());
        });

        if let Some(previous) = self.debounce_timers.insert(canonical, handle) {
            previous.abort();
        }
    }
}
