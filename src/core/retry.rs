//! Fixed-count retry with a fixed delay.
//!
//! Upstream MAAS calls are wrapped in a [`RetryPolicy`]: up to `attempts`
//! invocations separated by a constant `delay`. There is no backoff and no
//! jitter. Errors that report themselves as permanent through [`Retryable`]
//! fail on the first attempt, and the async variant observes a
//! [`CancellationToken`] before every attempt and while sleeping.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Classifies an error as transient or permanent.
pub trait Retryable {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Retry configuration: attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one (always >= 1).
    attempts: u32,

    /// Delay slept between two consecutive attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Create a policy. `attempts` must be at least 1.
    pub fn new(attempts: u32, delay: Duration) -> Result<Self, InvalidRetryPolicy> {
        if attempts == 0 {
            return Err(InvalidRetryPolicy);
        }
        Ok(Self { attempts, delay })
    }

    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self { attempts: 1, delay: Duration::ZERO }
    }

    /// Attempt budget.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Fixed delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Worst-case time spent sleeping if every attempt fails.
    pub fn worst_case_sleep(&self) -> Duration {
        self.delay.saturating_mul(self.attempts.saturating_sub(1))
    }
}

/// Returned when a policy is built with zero attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("retry attempts must be at least 1")]
pub struct InvalidRetryPolicy;

/// Terminal failure of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("non-retryable failure on attempt {attempt}: {source}")]
    Permanent {
        attempt: u32,
        #[source]
        source: E,
    },

    #[error("operation canceled after {attempts} attempts")]
    Canceled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// The last error returned by the operation, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. } | Self::Permanent { source, .. } => Some(source),
            Self::Canceled { .. } => None,
        }
    }

    /// Whether the loop stopped because of cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or terminal error).
    pub result: Result<T, RetryError<E>>,

    /// Number of times the operation was invoked.
    pub attempts: u32,

    /// Total time spent, including delays.
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether more than one attempt was made.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        self.result
    }
}

/// Retry a blocking operation, sleeping the current thread between attempts.
pub fn retry<T, E, F>(policy: &RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Result<T, E>,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match operation() {
            Ok(value) => return finish(Ok(value), attempts, start),
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!(attempt = attempts, error = %error, "permanent failure, not retrying");
            return finish(Err(RetryError::Permanent { attempt: attempts, source: error }), attempts, start);
        }
        if attempts >= policy.attempts {
            return finish(Err(RetryError::Exhausted { attempts, source: error }), attempts, start);
        }

        tracing::warn!(attempt = attempts, of = policy.attempts, error = %error, "attempt failed, retrying");
        std::thread::sleep(policy.delay);
    }
}

/// Retry an async operation, observing `cancel` before each attempt and
/// during each sleep.
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryResult<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return finish(Err(RetryError::Canceled { attempts }), attempts, start);
        }

        attempts += 1;
        let error = match operation().await {
            Ok(value) => return finish(Ok(value), attempts, start),
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!(attempt = attempts, error = %error, "permanent failure, not retrying");
            return finish(Err(RetryError::Permanent { attempt: attempts, source: error }), attempts, start);
        }
        if attempts >= policy.attempts {
            return finish(Err(RetryError::Exhausted { attempts, source: error }), attempts, start);
        }

        tracing::warn!(attempt = attempts, of = policy.attempts, error = %error, "attempt failed, retrying");

        tokio::select! {
            () = cancel.cancelled() => {
                return finish(Err(RetryError::Canceled { attempts }), attempts, start);
            }
            () = tokio::time::sleep(policy.delay) => {}
        }
    }
}

fn finish<T, E>(result: Result<T, RetryError<E>>, attempts: u32, start: Instant) -> RetryResult<T, E> {
    RetryResult { result, attempts, total_time: start.elapsed() }
}
