//! Circuit breaker as an explicit state machine.
//!
//! After `failure_threshold` consecutive failures within `failure_window`
//! the circuit opens and calls are rejected immediately. Once
//! `break_duration` has elapsed the circuit admits a bounded number of
//! half-open trial calls; `success_threshold` consecutive successes close
//! it, any half-open failure reopens it.

use parking_lot::Mutex;
use spintrack_core::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through normally
    Closed,
    /// Requests fail immediately
    Open,
    /// Limited requests allowed to test recovery
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Successes in half-open state required to close the circuit
    pub success_threshold: usize,
    /// Failures older than this window do not count toward the threshold
    pub failure_window: Duration,
    /// How long the circuit stays open before admitting trial calls
    pub break_duration: Duration,
    /// Maximum concurrent calls admitted in half-open state
    pub half_open_max_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            failure_window: Duration::from_secs(60),
            break_duration: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

/// Point-in-time breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub last_failure: Option<Instant>,
    pub last_state_change: Instant,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    half_open_calls: usize,
    last_failure: Option<Instant>,
    last_state_change: Instant,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState) {
        if self.state != to {
            match to {
                CircuitState::Open => log::warn!("circuit breaker opening"),
                CircuitState::HalfOpen => log::info!("circuit breaker entering half-open state"),
                CircuitState::Closed => log::info!("circuit breaker closing"),
            }
            self.state = to;
            self.last_state_change = Instant::now();
            self.failure_count = 0;
            self.success_count = 0;
            self.half_open_calls = 0;
        }
    }
}

/// Circuit breaker implementation
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure: None,
                last_state_change: Instant::now(),
            }),
        }
    }

    /// Current state, promoting Open to HalfOpen once the break has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open
            && inner.last_state_change.elapsed() >= self.config.break_duration
        {
            inner.transition(CircuitState::HalfOpen);
        }
        inner.state
    }

    /// Execute an operation through the circuit breaker
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.state() {
            CircuitState::Open => {
                return Err(Error::unavailable("circuit breaker is open"));
            }
            CircuitState::HalfOpen => {
                let mut inner = self.inner.lock();
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    return Err(Error::unavailable("circuit breaker half-open limit reached"));
                }
                inner.half_open_calls += 1;
            }
            CircuitState::Closed => {}
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Current breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure: inner.last_failure,
            last_state_change: inner.last_state_change,
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.last_failure = None;
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        // Failures outside the window restart the count
        if let Some(last) = inner.last_failure {
            if now.duration_since(last) > self.config.failure_window {
                inner.failure_count = 0;
            }
        }
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.transition(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing reopens the circuit
                inner.transition(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }
}
