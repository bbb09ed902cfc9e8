//! Shared utilities for the spintrack workspace.
//!
//! Provides the injectable wall clock, retry with exponential backoff, the
//! circuit breaker state machine, and the tracing-subscriber init helper.

pub mod clock;
pub mod resilience;
pub mod tracing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use resilience::{retry, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig};
