//! Offline fallback, retry replay, and resilient reads.

mod fallback;
mod resilient;
mod service;

pub use fallback::FallbackStore;
pub use service::{OfflineService, OfflineStatus};
