//! Bounded retry with exponential backoff for transient network failures

use crate::config::RetryPolicy;
use crate::errors::{AuthError, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as transient (worth retrying) or terminal
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        // builder/redirect/status errors repeat identically on every attempt
        !(self.is_builder() || self.is_redirect() || self.is_status())
    }
}

impl IsRetryable for AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            AuthError::Network(e) => e.is_retryable(),
            AuthError::Rejected(_) => false,
        }
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_retryable(),
            FetchError::Auth(e) => e.is_retryable(),
            // status, write and directory failures are terminal for the task
            FetchError::Status { .. }
            | FetchError::Write { .. }
            | FetchError::Directory { .. }
            | FetchError::UnsafePath { .. } => false,
        }
    }
}

/// Run `operation`, retrying retryable failures up to `policy.max_retries` times.
///
/// Returns the first success, the first terminal error, or the last error once
/// retries are exhausted.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );

                let wait = if policy.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next = Duration::from_secs_f64(delay.as_secs_f64() * policy.backoff_multiplier);
                delay = next.min(policy.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt + 1, "Retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

/// Spread the delay uniformly over `[delay, 2 * delay]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
