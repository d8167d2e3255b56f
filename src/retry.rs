//! Retry utilities with exponential backoff
//!
//! The chat engine itself never retries. [`HttpTransport`](crate::HttpTransport)
//! uses these helpers to retry *opening* a request (connection failures, 5xx
//! responses); once deltas start flowing, nothing is replayed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ollama_chat::retry::{retry_with_backoff, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_initial_delay(Duration::from_millis(200));
//!
//! let result = retry_with_backoff(config, || async {
//!     Ok::<_, ollama_chat::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    pub initial_delay: Duration,

    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Fraction of the delay randomised around its nominal value (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let capped = (base_ms * self.backoff_multiplier.powi(attempt as i32))
            .min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range - jitter_range / 2.0;

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Whether an error is worth another attempt.
///
/// Connection failures, timeouts and 5xx responses are; anything the server
/// rejected on purpose (4xx, unsupported capability), argument problems and
/// cancellation are not.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Http(e) => e.status().is_none_or(|s| s.is_server_error()),
        Error::Timeout => true,
        Error::Api(msg) => msg.starts_with("HTTP 5"),
        _ => false,
    }
}

async fn run<F, Fut, T, P>(config: RetryConfig, mut operation: F, should_retry: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if attempt >= config.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = config.calculate_delay(attempt - 1);
                log::debug!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    config.max_attempts,
                    err,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

/// Retry `operation` on any error.
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(config, operation, |_| true).await
}

/// Retry `operation` only while [`is_retryable_error`] holds.
pub async fn retry_with_backoff_conditional<F, Fut, T>(
    config: RetryConfig,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(config, operation, is_retryable_error).await
}
