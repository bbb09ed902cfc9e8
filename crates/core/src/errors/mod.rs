//! Error taxonomy for the cache orchestration layer.
//!
//! Every failure the orchestrators can observe is a variant of [`Error`],
//! classified up front as retryable or not. The resilience layer consults
//! [`Error::is_retryable`] to decide between retrying, queueing for replay,
//! and propagating; consumers get a stable [`Error::kind`] string alongside
//! the retryable flag so they can render a sensible error affordance.

mod builders;
mod display;
mod types;

pub use types::{Error, Result};

impl Error {
    /// Whether the resilience layer may retry the failed operation.
    ///
    /// Server errors, network failures, and timeouts are transient; client,
    /// auth, and logic-level errors are not and propagate immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Server { .. } | Error::Network { .. } | Error::Timeout { .. }
        )
    }

    /// Whether the error requires a forced re-authentication flow.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    /// Stable machine-readable error kind for consumers and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Error::Client { .. } => "client",
            Error::Auth { .. } => "auth",
            Error::Server { .. } => "server",
            Error::Network { .. } => "network",
            Error::Timeout { .. } => "timeout",
            Error::Validation { .. } => "validation",
            Error::Serialization { .. } => "serialization",
            Error::Storage { .. } => "storage",
            Error::Configuration { .. } => "configuration",
            Error::Unavailable { .. } => "unavailable",
            Error::OfflineUnavailable { .. } => "offline_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            Error::from_status(404, "not found"),
            Error::Client { status: 404, .. }
        ));
        assert!(matches!(
            Error::from_status(401, "expired"),
            Error::Auth { status: 401, .. }
        ));
        assert!(matches!(
            Error::from_status(503, "overloaded"),
            Error::Server { status: 503, .. }
        ));
    }

    #[test]
    fn retryability_follows_taxonomy() {
        assert!(!Error::client(404, "missing").is_retryable());
        assert!(!Error::auth(403, "forbidden").is_retryable());
        assert!(!Error::validation("bad key").is_retryable());
        assert!(Error::server(500, "boom").is_retryable());
        assert!(Error::network("refused").is_retryable());
        assert!(Error::timeout("fetch", std::time::Duration::from_secs(1)).is_retryable());
    }
}
