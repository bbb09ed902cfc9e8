//! Invalidation orchestrator.
//!
//! Decides when and in what grouping store entries are invalidated:
//! debounced single keys, window-coalesced batches, dependency cascades,
//! age/priority scans, and mutation-mapped families. Invalidation is
//! best-effort throughout: failures are logged at their origin and never
//! propagate to callers; retry belongs to the offline/resilience layer.

mod batch;
mod cascade;
mod debounce;
mod mutation;
mod selective;
mod stale;

pub use cascade::{CascadeScope, ResourceFamily};
pub use mutation::{MutationKind, RefreshStrategy};
pub use selective::SelectiveInvalidation;

use crate::config::CacheConfig;
use batch::BatchState;
use dashmap::DashMap;
use parking_lot::Mutex;
use spintrack_store::QueryStore;
use spintrack_utils::Clock;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Orchestrates all invalidation strategies over one query store.
pub struct InvalidationService {
    store: Arc<dyn QueryStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    /// One pending debounce timer per canonical key, latest wins.
    debounce_timers: Arc<DashMap<String, JoinHandle<()>>>,
    batch: Arc<Mutex<BatchState>>,
}

impl InvalidationService {
    pub fn new(store: Arc<dyn QueryStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
            debounce_timers: Arc::new(DashMap::new()),
            batch: Arc::new(Mutex::new(BatchState::default())),
        }
    }

    /// Number of debounce timers currently pending.
    pub fn pending_debounces(&self) -> usize {
        self.debounce_timers.len()
    }

    /// Cancel every pending timer. Pending batch contents are dropped.
    pub fn shutdown(&self) {
        for entry in self.debounce_timers.iter() {
            entry.value().abort();
        }
        self.debounce_timers.clear();
        self.batch.lock().clear();
    }
}

impl Drop for InvalidationService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
