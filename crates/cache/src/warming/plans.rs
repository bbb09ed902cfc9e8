//! Warming plans: which keys each pass populates and how long they stay
//! fresh.

use spintrack_core::QueryKey;

const MINUTE_MS: i64 = 60 * 1000;

/// One key to prefetch, with the freshness horizon handed to the store.
#[derive(Debug, Clone)]
pub struct WarmTarget {
    pub key: QueryKey,
    pub stale_time_ms: i64,
}

impl WarmTarget {
    fn new(key: QueryKey, stale_time_ms: i64) -> Self {
        Self { key, stale_time_ms }
    }
}

/// Session, profile, and preferences for the user. The data nothing else
/// renders without.
pub fn essential(user_id: &str) -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["session"]).join(user_id), 5 * MINUTE_MS),
        WarmTarget::new(
            QueryKey::of(["user", "profile"]).join(user_id),
            10 * MINUTE_MS,
        ),
        WarmTarget::new(
            QueryKey::of(["user", "preferences"]).join(user_id),
            30 * MINUTE_MS,
        ),
    ]
}

pub fn dashboard_essential() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["dashboard", "essential", "summary"]), 2 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["dashboard", "essential", "metrics"]), 2 * MINUTE_MS),
    ]
}

pub fn dashboard_secondary() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["dashboard", "secondary", "trends"]), 5 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["dashboard", "secondary", "comparisons"]), 5 * MINUTE_MS),
    ]
}

pub fn dashboard_optional() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["dashboard", "optional", "history"]), 10 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["dashboard", "optional", "exports"]), 10 * MINUTE_MS),
    ]
}

pub fn realtime() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["realtime", "spins"]), 30 * 1000),
        WarmTarget::new(QueryKey::of(["realtime", "listeners"]), 30 * 1000),
    ]
}

pub fn admin() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["admin", "users"]), MINUTE_MS),
        WarmTarget::new(QueryKey::of(["admin", "system-health"]), MINUTE_MS),
    ]
}

pub fn analytics() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["dashboard", "secondary", "trends"]), 5 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["dashboard", "optional", "history"]), 10 * MINUTE_MS),
    ]
}

/// Slow-moving reference data, safe to hold for a day.
pub fn static_reference() -> Vec<WarmTarget> {
    vec![
        WarmTarget::new(QueryKey::of(["static", "stations"]), 24 * 60 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["static", "markets"]), 24 * 60 * MINUTE_MS),
        WarmTarget::new(QueryKey::of(["static", "genres"]), 24 * 60 * MINUTE_MS),
    ]
}
