//! Retry logic with exponential backoff and jitter.

use spintrack_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: usize = 3;

/// Default base delay for exponential backoff (1s)
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay for exponential backoff (30s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default jitter factor (0.25 = up to ±25% randomization)
const DEFAULT_JITTER_FACTOR: f64 = 0.25;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first call)
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Jitter factor for randomization (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Tighter schedule for interactive reads.
    #[must_use]
    pub fn for_reads() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.25,
        }
    }

    /// Whether an error should be retried. Delegates to the taxonomy:
    /// 4xx/auth/validation never retry, 5xx/network/timeout do.
    #[must_use]
    pub fn should_retry(&self, error: &Error) -> bool {
        error.is_retryable()
    }

    /// Delay before the given attempt: `base * 2^attempt` capped at
    /// `max_delay`, with ± jitter to avoid synchronized retries.
    #[must_use]
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt as u32));
        let capped = exponential.min(self.max_delay);

        if self.jitter_factor > 0.0 {
            let jitter_range = capped.as_millis() as f64 * self.jitter_factor;
            let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_range;
            let final_millis = (capped.as_millis() as f64 + jitter).max(0.0) as u64;
            Duration::from_millis(final_millis)
        } else {
            capped
        }
    }
}

/// Execute an operation with retry logic.
///
/// Non-retryable errors are returned after the first attempt; retryable
/// errors are retried up to `max_retries` times with backoff between
/// attempts.
pub async fn retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    log::info!("operation succeeded after {attempt} retries");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_retries || !config.should_retry(&error) {
                    return Err(error);
                }
                let delay = config.calculate_delay(attempt);
                log::warn!(
                    "operation failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    delay,
                    error
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_never_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<()> = retry(&RetryConfig::default(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::client(404, "not found"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retry_up_to_max() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let result: Result<()> = retry(&config, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::server(503, "unavailable"))
            }
        })
        .await;

        assert!(result.is_err());
        // initial attempt plus three retries
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let config = RetryConfig {
            base_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let result = retry(&config, || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::network("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delays_grow_and_stay_capped() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(config.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(400));
        // capped
        assert_eq!(config.calculate_delay(10), Duration::from_secs(1));
    }

    #[test]
    fn jitter_randomizes_within_range() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter_factor: 0.5,
            ..Default::default()
        };

        let mut delays = Vec::new();
        for _ in 0..10 {
            delays.push(config.calculate_delay(2));
        }

        let unique: HashSet<_> = delays.iter().collect();
        assert!(unique.len() > 1);

        // 400ms ± 50%
        for delay in delays {
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(600));
        }
    }
}
