//! Age/priority/user-filtered invalidation.

use super::InvalidationService;
use spintrack_core::{Priority, QueryKey};
use tracing::debug;

/// Filter for a selective invalidation scan.
#[derive(Debug, Clone, Default)]
pub struct SelectiveInvalidation {
    /// Entries older than this are selected. `None` selects nothing unless
    /// `force` is set.
    pub max_age_ms: Option<i64>,
    /// Restrict to keys carrying this priority tier as a segment.
    pub priority: Option<Priority>,
    /// Restrict to keys carrying this user id as a segment.
    pub user_id: Option<String>,
    /// Select matching keys regardless of age.
    pub force: bool,
}

impl InvalidationService {
    /// Scan every store entry, select those matching the filter, and hand
    /// them to the shared batch.
    pub fn selective_invalidate(&self, filter: &SelectiveInvalidation) {
        let now = self.clock.now_ms();
        let max_age = filter.max_age_ms.unwrap_or(5 * 60 * 1000);

        let selected: Vec<QueryKey> = self
            .store
            .entries()
            .into_iter()
            .filter(|entry| filter.force || entry.age_ms(now) > max_age)
            .map(|entry| entry.key)
            .filter(|key| {
                filter
                    .priority
                    .map_or(true, |p| key.contains_segment(p.as_segment()))
            })
            .filter(|key| {
                filter
                    .user_id
                    .as_deref()
                    .map_or(true, |user| key.contains_segment(user))
            })
            .collect();

        if !selected.is_empty() {
            debug!(count = selected.len(), "selective invalidation");
            self.batch_invalidate(&selected);
        }
    }
}
