//! Session coordination for spintrack.
//!
//! Validates sessions through an [`provider::IdentityProvider`], refreshes
//! tokens single-flight with proactive scheduling, mirrors auth lifecycle
//! events into the query store, and resolves user plans and permissions.

pub mod manager;
pub mod metadata;
pub mod provider;

pub use manager::{SessionConfig, SessionCoordinator, SessionState, SessionStats};
pub use metadata::{
    resolve_access, MetadataBackend, MetadataPatch, PlanTier, ResolvedAccess, UserMetadata,
    UserMetadataCache,
};
pub use provider::{AuthEvent, AuthUser, IdentityProvider, Session};
