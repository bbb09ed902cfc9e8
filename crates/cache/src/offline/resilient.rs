//! Classification-driven resilient reads.

use super::service::OfflineService;
use serde_json::Value;
use spintrack_core::{QueryKey, Result};
use spintrack_utils::retry;
use tracing::{debug, warn};

impl OfflineService {
    /// Fetch through the store with retry on transient failures.
    ///
    /// Non-retryable errors (client, auth, validation) propagate
    /// immediately. When retries are exhausted while offline the key is
    /// queued for replay and a fallback snapshot is served if one exists.
    /// Successful reads of `durable` keys refresh their fallback snapshot.
    pub async fn resilient_fetch(&self, key: &QueryKey, durable: bool) -> Result<Value> {
        let fetched = retry(&self.config.retry, || async {
            self.store.refetch(key).await
        })
        .await;
        match fetched {
            Ok(value) => {
                if durable {
                    if let Err(e) = self.store_fallback(key, &value, None) {
                        warn!(key = %key, error = %e, "fallback snapshot write failed");
                    }
                }
                Ok(value)
            }
            Err(e) if e.is_retryable() && !self.is_online() => {
                self.queue_for_retry(key);
                debug!(key = %key, "retries exhausted offline, trying fallback");
                self.serve_offline_data(key).await.map_err(|_| e)
            }
            Err(e) => Err(e),
        }
    }
}
