//! Cache orchestration for spintrack.
//!
//! This crate coordinates a [`spintrack_store::QueryStore`] from above:
//! - **`invalidation`**: debounced, batched, cascading, selective, and
//!   mutation-driven invalidation.
//! - **`warming`**: staged login warming, behavior/navigation/predictive
//!   warming, idle warming, deduplicated through an in-flight task registry.
//! - **`offline`**: durable fallback snapshots, connectivity handling,
//!   retry-queue replay, and classification-driven resilient reads.
//! - **`health`**: periodic store sampling into a health score with
//!   delta-gated notifications.
//! - **`manager`**: a facade wiring the services together.

pub mod config;
pub mod health;
#[cfg(test)]
pub(crate) mod testutil;
pub mod invalidation;
pub mod manager;
pub mod offline;
pub mod warming;

pub use config::CacheConfig;
pub use health::{CacheStatusSnapshot, HealthMonitor};
pub use invalidation::{
    CascadeScope, InvalidationService, MutationKind, RefreshStrategy, ResourceFamily,
    SelectiveInvalidation,
};
pub use manager::CacheManager;
pub use offline::{OfflineService, OfflineStatus};
pub use warming::{
    BehaviorTag, IdlePolicy, PredictiveContext, UserProfile, WarmingOutcome, WarmingService,
};
