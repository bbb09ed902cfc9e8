//! Core domain types, errors, and constants for spintrack.
//!
//! This crate establishes the foundational data structures and error handling
//! used throughout the cache orchestration workspace.
//!
//! ## Key Components
//!
//! - **`errors`**: The `Error` enum and `Result` alias, centralizing every
//!   failure mode the orchestration layer can surface, with a retryability
//!   classification consumed by the resilience layer.
//! - **`keys`**: The structured `QueryKey` type identifying logical resources
//!   in the query store, plus the `Priority` tiers used for selective
//!   invalidation and warming.
//! - **`entry`**: Read-only views of query store entries as observed by the
//!   orchestrators.
//! - **`constants`**: Shared default timings.

pub mod constants;
pub mod entry;
pub mod errors;
pub mod keys;

pub use self::{
    constants::*,
    entry::{EntrySnapshot, EntryStatus},
    errors::{Error, Result},
    keys::{Priority, QueryKey},
};
