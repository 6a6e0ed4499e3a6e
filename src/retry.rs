//! Retry logic with linear backoff
//!
//! Storage-service calls fail transiently with 5xx responses when a pod is busy
//! or an upload URL has gone stale. This module retries such failures with a
//! linearly growing delay: the sleep after the k-th failed attempt is
//! `k * delay`, capped at `max_delay`, with optional jitter.
//!
//! # Example
//!
//! ```no_run
//! use blazer::retry::{IsRetryable, with_retry};
//! use blazer::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Only failures that a fresh attempt can plausibly fix should return `true`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // The service answered 5xx: retry with a fresh URL/token
            Error::Api(e) => e.is_server_error(),
            // Everything else aborts the owning task immediately
            Error::Config { .. }
            | Error::Credentials(_)
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::Transfer(_)
            | Error::NotFound(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation, retrying retryable failures with linear backoff
///
/// `config.max_attempts` is the total number of attempts, including the first.
/// Every attempt calls `operation` afresh, so per-attempt setup (requesting a
/// new upload URL, reopening a file) belongs inside the closure.
///
/// Returns the successful result or the last error once the ceiling is reached
/// or a non-retryable error occurs.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt);

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Delay to sleep after `failed_attempts` consecutive failures
///
/// Linear in the number of failures, capped at `max_delay`, then jittered if enabled.
pub fn backoff_delay(config: &RetryConfig, failed_attempts: u32) -> Duration {
    let linear = config.delay.saturating_mul(failed_attempts).min(config.max_delay);
    if config.jitter {
        add_jitter(linear)
    } else {
        linear
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `1.5 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=0.5);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
