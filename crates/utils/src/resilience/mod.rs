//! Resilience patterns for transient failures.
//!
//! ## Key Components
//!
//! - **`retry`**: Bounded retry with capped exponential backoff and jitter,
//!   gated on the error taxonomy's retryability classification.
//! - **`breaker`**: Circuit breaker modeled as an explicit
//!   `Closed | Open | HalfOpen` state machine.

pub mod breaker;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use retry::{retry, RetryConfig};
