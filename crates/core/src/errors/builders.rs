//! Builder methods for creating errors with context

use super::types::Error;
use std::time::Duration;

impl Error {
    /// Create a client error (4xx)
    #[must_use]
    pub fn client(status: u16, message: impl Into<String>) -> Self {
        Error::Client {
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error (401/403)
    #[must_use]
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Error::Auth {
            status,
            message: message.into(),
        }
    }

    /// Create a server error (5xx)
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Error::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a serialization error from a serde_json failure
    #[must_use]
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Serialization {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a durable storage error
    #[must_use]
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Storage {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unavailability error
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Error::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create an offline-miss error for a serialized cache key
    #[must_use]
    pub fn offline_unavailable(key: impl Into<String>) -> Self {
        Error::OfflineUnavailable { key: key.into() }
    }

    /// Classify an HTTP status code into the error taxonomy
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::auth(status, message),
            400..=499 => Self::client(status, message),
            _ => Self::server(status, message),
        }
    }
}
