//! Orchestration tunables.

use spintrack_core::constants;
use spintrack_utils::RetryConfig;
use std::time::Duration;

/// Configuration for the cache orchestration services.
///
/// Defaults match the shipped behavior; embedders override individual fields
/// through struct update syntax.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default delay for debounced single-key invalidation.
    pub debounce_delay: Duration,
    /// Fixed window during which batched invalidations coalesce.
    pub batch_window: Duration,
    /// Delay before the background refetch of a mutation-invalidated family.
    pub background_refetch_delay: Duration,
    /// Stagger delays for stale refresh of secondary/optional tiers.
    pub stale_secondary_delay: Duration,
    pub stale_optional_delay: Duration,
    /// Default TTL for durable fallback snapshots.
    pub fallback_ttl_ms: i64,
    /// Retry policy for resilient reads.
    pub retry: RetryConfig,
    /// Queued reads replayed concurrently after reconnecting.
    pub replay_batch_size: usize,
    /// Pause between replay batches.
    pub replay_batch_delay: Duration,
    /// Cache health poll interval.
    pub health_poll_interval: Duration,
    /// Health-score change below this does not notify subscribers.
    pub health_score_delta: f64,
    /// Idle warming check interval.
    pub idle_warming_interval: Duration,
    /// Frequently-accessed warming is skipped when the last run is younger
    /// than this.
    pub warming_throttle_ms: i64,
    /// Non-essential stale refetches on visibility change are capped at this
    /// many entries.
    pub visibility_refetch_cap: usize,
    /// Delay before non-essential stale refetches on visibility change.
    pub visibility_refetch_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce_delay: constants::DEFAULT_DEBOUNCE_DELAY,
            batch_window: constants::BATCH_WINDOW,
            background_refetch_delay: Duration::from_secs(1),
            stale_secondary_delay: Duration::from_secs(1),
            stale_optional_delay: Duration::from_secs(3),
            fallback_ttl_ms: constants::DEFAULT_FALLBACK_TTL_MS,
            retry: RetryConfig::for_reads(),
            replay_batch_size: constants::RETRY_REPLAY_BATCH_SIZE,
            replay_batch_delay: constants::RETRY_REPLAY_BATCH_DELAY,
            health_poll_interval: constants::HEALTH_POLL_INTERVAL,
            health_score_delta: 5.0,
            idle_warming_interval: constants::IDLE_WARMING_INTERVAL,
            warming_throttle_ms: 5 * 60 * 1000,
            visibility_refetch_cap: 5,
            visibility_refetch_delay: Duration::from_secs(2),
        }
    }
}
