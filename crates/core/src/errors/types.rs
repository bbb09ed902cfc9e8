//! Core error type definitions

use std::time::Duration;

/// Result type alias for spintrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cache orchestration using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client-side HTTP errors (4xx other than auth). Never retried.
    Client { status: u16, message: String },

    /// Authentication/authorization failures (401/403). Never retried;
    /// consumers are expected to force a re-auth flow.
    Auth { status: u16, message: String },

    /// Server-side HTTP errors (5xx). Retryable.
    Server { status: u16, message: String },

    /// Network-level failures (connection refused, DNS, aborted). Retryable.
    Network { message: String },

    /// Operation timeout. Retryable.
    Timeout { operation: String, duration: Duration },

    /// Logic-level validation failures, e.g. a malformed cache key.
    Validation { message: String },

    /// JSON serialization/deserialization errors
    Serialization {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Durable storage faults (fallback snapshots, persisted rules)
    Storage { key: String, message: String },

    /// Configuration errors
    Configuration { message: String },

    /// Rejected without being attempted, e.g. by an open circuit breaker
    Unavailable { reason: String },

    /// No live entry and no valid fallback snapshot for the key
    OfflineUnavailable { key: String },
}

// Manual because `serde_json::Error` is not `Clone`; the rendered message
// survives the clone, the structured source does not. Shared futures
// (single-flight refresh) hand the same error to every joiner.
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Client { status, message } => Error::Client {
                status: *status,
                message: message.clone(),
            },
            Error::Auth { status, message } => Error::Auth {
                status: *status,
                message: message.clone(),
            },
            Error::Server { status, message } => Error::Server {
                status: *status,
                message: message.clone(),
            },
            Error::Network { message } => Error::Network {
                message: message.clone(),
            },
            Error::Timeout {
                operation,
                duration,
            } => Error::Timeout {
                operation: operation.clone(),
                duration: *duration,
            },
            Error::Validation { message } => Error::Validation {
                message: message.clone(),
            },
            Error::Serialization { message, .. } => Error::Serialization {
                message: message.clone(),
                source: None,
            },
            Error::Storage { key, message } => Error::Storage {
                key: key.clone(),
                message: message.clone(),
            },
            Error::Configuration { message } => Error::Configuration {
                message: message.clone(),
            },
            Error::Unavailable { reason } => Error::Unavailable {
                reason: reason.clone(),
            },
            Error::OfflineUnavailable { key } => Error::OfflineUnavailable { key: key.clone() },
        }
    }
}
