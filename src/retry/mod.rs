//! Bounded retry with exponential backoff.
//!
//! Attempts run strictly one after another. After a failed attempt the
//! retryability predicate decides whether another attempt is worth it;
//! the delay before attempt `n + 1` is
//! `min(base_delay * backoff_base^(n - 1), max_delay)`. There is no jitter,
//! so a given config always produces the same schedule.

pub mod profiles;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::time::sleep;

use crate::constants::DEFAULT_BACKOFF_BASE;
use crate::security::scrub_credentials;

pub use profiles::RetryProfiles;

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// The operation did not finish within its time budget.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{label} timed out after {timeout_ms}ms")]
pub struct TimeoutError {
    pub label: String,
    pub timeout_ms: u64,
}

/// Context attached when a retried operation ultimately fails.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{label} failed after {attempts} attempt(s)")]
pub struct RetryFailed {
    pub label: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_base: f64,
    pub retryable: RetryPredicate,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_base", &self.backoff_base)
            .finish()
    }
}

impl RetryConfig {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        retryable: RetryPredicate,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_base: DEFAULT_BACKOFF_BASE,
            retryable,
        }
    }

    /// Zero-delay config that retries every error.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, Arc::new(|_: &anyhow::Error| true))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.backoff_base.powi(exponent)).min(max_ms);
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }

    pub fn is_retryable(&self, err: &anyhow::Error) -> bool {
        (self.retryable)(err)
    }
}

/// What happened while retrying one operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub label: String,
    /// The value, or the error from the last attempt.
    pub result: Result<T>,
    pub attempts: u32,
    pub total_time: Duration,
}

impl<T> RetryOutcome<T> {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time.as_millis() as u64
    }

    pub fn last_error(&self) -> Option<&anyhow::Error> {
        self.result.as_ref().err()
    }

    /// Unwrap the value, or return the last error with a [`RetryFailed`]
    /// context naming the label and the number of attempts made.
    pub fn into_result(self) -> Result<T> {
        let label = self.label;
        let attempts = self.attempts;
        self.result
            .map_err(|e| e.context(RetryFailed { label, attempts }))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
///
/// Failed attempts sleep for the config's backoff delay before the next
/// one. Each retry is logged under `label`.
///
/// # Arguments
///
/// * `operation` - Factory producing one attempt per call
/// * `config` - Attempt budget, delay bounds and retry predicate
/// * `label` - Step name used in logs and in the final error context
///
/// # Returns
///
/// The last result together with the number of attempts made and the
/// total elapsed time
pub async fn execute_with_retry<T, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    label: &str,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}/{}", label, attempt, max_attempts);
                }
                return RetryOutcome {
                    label: label.to_string(),
                    result: Ok(value),
                    attempts: attempt,
                    total_time: start.elapsed(),
                };
            }
            Err(err) => err,
        };

        let message = scrub_credentials(&format!("{:#}", err));

        if !config.is_retryable(&err) {
            debug!("{} failed with a non-retryable error on attempt {}: {}", label, attempt, message);
            return RetryOutcome {
                label: label.to_string(),
                result: Err(err),
                attempts: attempt,
                total_time: start.elapsed(),
            };
        }

        if attempt >= max_attempts {
            warn!("{} failed on final attempt {}/{}: {}", label, attempt, max_attempts, message);
            return RetryOutcome {
                label: label.to_string(),
                result: Err(err),
                attempts: attempt,
                total_time: start.elapsed(),
            };
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            "{} attempt {}/{} failed, retrying in {:?}: {}",
            label, attempt, max_attempts, delay, message
        );
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

/// Race `operation` against a timer of `timeout`.
///
/// When the timer wins the operation is dropped and a [`TimeoutError`] is
/// returned, which every retry profile treats as transient.
pub async fn with_timeout<T, Fut>(operation: Fut, timeout: Duration, label: &str) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::Error::new(TimeoutError {
            label: label.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })),
    }
}

/// True when a [`TimeoutError`] appears anywhere in the chain.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<TimeoutError>().is_some())
}
