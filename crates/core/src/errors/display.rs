//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Client { status, message } => {
                write!(f, "client error ({status}): {message}")
            }
            Error::Auth { status, message } => {
                write!(f, "authentication error ({status}): {message}")
            }
            Error::Server { status, message } => {
                write!(f, "server error ({status}): {message}")
            }
            Error::Network { message } => {
                write!(f, "network error: {message}")
            }
            Error::Timeout {
                operation,
                duration,
            } => {
                write!(f, "operation '{operation}' timed out after {duration:?}")
            }
            Error::Validation { message } => {
                write!(f, "validation error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "serialization error: {message}")
            }
            Error::Storage { key, message } => {
                write!(f, "storage error for '{key}': {message}")
            }
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::Unavailable { reason } => {
                write!(f, "service unavailable: {reason}")
            }
            Error::OfflineUnavailable { key } => {
                write!(f, "no offline data available for '{key}'")
            }
        }
    }
}
