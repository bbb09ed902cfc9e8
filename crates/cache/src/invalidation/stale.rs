//! Stale refresh staggered by priority tier.

use super::InvalidationService;
use spintrack_core::{Priority, QueryKey};
use tracing::{debug, warn};

impl InvalidationService {
    /// Refetch stale entries for the requested tiers. Essential entries are
    /// refreshed immediately; secondary and optional tiers are deferred so a
    /// burst of staleness does not stampede the backend.
    pub async fn refresh_stale(&self, tiers: &[Priority], user_id: Option<&str>) {
        let stale: Vec<QueryKey> = self
            .store
            .entries()
            .into_iter()
            .filter(|e| e.is_stale)
            .map(|e| e.key)
            .filter(|k| user_id.map_or(true, |u| k.contains_segment(u)))
            .collect();

        if stale.is_empty() {
            debug!("no stale entries to refresh");
            return;
        }

        for tier in tiers {
            let keys: Vec<QueryKey> = stale
                .iter()
                .filter(|k| k.contains_segment(tier.as_segment()))
                .cloned()
                .collect();
            if keys.is_empty() {
                continue;
            }

            match tier {
                Priority::Essential => {
                    debug!(count = keys.len(), "refreshing essential stale entries");
                    for key in keys {
                        if let Err(e) = self.store.refetch(&key).await {
                            warn!(key = %key, error = %e, "stale refresh failed");
                        }
                    }
                }
                Priority::Secondary | Priority::Optional => {
                    let delay = if *tier == Priority::Secondary {
                        self.config.stale_secondary_delay
                    } else {
                        self.config.stale_optional_delay
                    };
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        for key in keys {
                            if let Err(e) = store.refetch(&key).await {
                                warn!(key = %key, error = %e, "deferred stale refresh failed");
                            }
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CacheConfig;
    use crate::invalidation::InvalidationService;
    use crate::testutil::{counting_store, key};
    use spintrack_core::Priority;
    use spintrack_utils::ManualClock;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn essential_refreshes_first_secondary_later() {
        let (store, counts) = counting_store();
        counts.seed_stale_entry(key(&["dashboard", "essential", "metrics"]));
        counts.seed_stale_entry(key(&["dashboard", "secondary", "top-songs"]));
        counts.seed_entry(key(&["dashboard", "essential", "user-info"]), 0);

        let svc = InvalidationService::new(
            store,
            ManualClock::new(0),
            CacheConfig::default(),
        );
        svc.refresh_stale(&[Priority::Essential, Priority::Secondary], None)
            .await;

        // only the stale essential entry was refetched synchronously
        assert_eq!(
            counts.refetched_keys(),
            vec![key(&["dashboard", "essential", "metrics"])]
        );

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        assert_eq!(counts.refetched_keys().len(), 2);
    }
}
