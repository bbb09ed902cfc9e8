//! Read-only views of query store entries.

use crate::keys::QueryKey;
use serde::{Deserialize, Serialize};

/// Fetch status of a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Success,
    Error,
}

/// A point-in-time view of one store entry, as observed by the
/// orchestrators. The store owns the entry; this is a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub status: EntryStatus,
    pub is_stale: bool,
    /// Epoch milliseconds of the last successful update, 0 if never.
    pub data_updated_at: i64,
    /// Epoch milliseconds of the last failed fetch, 0 if never.
    pub error_updated_at: i64,
    /// Set when the value was served from a durable offline snapshot.
    pub is_offline: bool,
}

impl EntrySnapshot {
    /// Age of the data relative to `now` (epoch ms). Entries that never
    /// succeeded report their full age since the epoch, which always exceeds
    /// any realistic max-age filter.
    #[must_use]
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.data_updated_at)
    }
}
