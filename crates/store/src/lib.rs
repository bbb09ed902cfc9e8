//! Query store and durable storage contracts for spintrack.
//!
//! The orchestration layer never owns cache entries; it coordinates a store
//! that implements [`QueryStore`]. This crate defines that contract, a
//! reference in-memory implementation used in-process and by tests, and the
//! synchronous [`DurableStorage`] contract used for offline fallback
//! snapshots and persisted alert state.

pub mod memory;
pub mod storage;
pub mod traits;

pub use memory::{MemoryStore, MemoryStoreConfig};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
pub use traits::{QueryFetcher, QueryStore, StoreEvent};
