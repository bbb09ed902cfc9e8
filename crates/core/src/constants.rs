//! Shared default timings for the orchestration layer.

use std::time::Duration;

/// Default debounce delay for single-key invalidation.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Window during which batched invalidations are coalesced.
pub const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Default time-to-live for durable fallback snapshots (24h).
pub const DEFAULT_FALLBACK_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// How long a cached session validation result stays authoritative.
pub const VALIDATION_CACHE_TTL_MS: i64 = 30 * 1000;

/// Proactive token refresh fires this long before expiry.
pub const REFRESH_THRESHOLD_MS: i64 = 5 * 60 * 1000;

/// Cache health poll interval.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Idle warming check interval.
pub const IDLE_WARMING_INTERVAL: Duration = Duration::from_secs(30);

/// How many queued reads are replayed concurrently after reconnecting.
pub const RETRY_REPLAY_BATCH_SIZE: usize = 3;

/// Pause between replay batches.
pub const RETRY_REPLAY_BATCH_DELAY: Duration = Duration::from_millis(500);
