//! Retry with exponential backoff and jitter.
//!
//! [`RetryPolicy`] is immutable configuration: constructed once, shared freely
//! across concurrent in-flight operations, no interior state. The backoff sleep
//! races a cancellation token so callers can abandon a retry loop mid-wait.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Exponent cap for backoff growth; beyond this the delay cap dominates anyway.
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Inclusive bounds for the uniform factor that scales each backoff delay.
///
/// Which bounds are right is a policy choice: `[0.5, 1.0]` (the default) keeps at
/// least half of every computed delay, while [`JitterBounds::full`] allows delays
/// to collapse to zero. Bounds are clamped into `[0.0, 1.0]` at construction so a
/// jittered delay never exceeds the computed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterBounds {
    low: f64,
    high: f64,
}

impl JitterBounds {
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        let low = if low.is_finite() { low.clamp(0.0, 1.0) } else { 0.0 };
        let high = if high.is_finite() { high.clamp(low, 1.0) } else { 1.0 };
        Self { low, high }
    }

    /// Full jitter: factor drawn from `[0.0, 1.0]`.
    #[must_use]
    pub fn full() -> Self {
        Self { low: 0.0, high: 1.0 }
    }

    #[must_use]
    pub fn low(self) -> f64 {
        self.low
    }

    #[must_use]
    pub fn high(self) -> f64 {
        self.high
    }
}

impl Default for JitterBounds {
    fn default() -> Self {
        Self { low: 0.5, high: 1.0 }
    }
}

/// Bounded retry with exponential backoff.
///
/// `max_attempts` is the total attempt budget including the first call; zero is
/// treated as one. The delay after the k-th failed attempt (1-based) is
/// `min(initial_delay x multiplier^(k-1), max_delay)`, then scaled by the jitter
/// factor when jitter is configured.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: Option<JitterBounds>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: Some(JitterBounds::default()),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the 0-based `attempt` has failed, before jitter.
    ///
    /// A multiplier at or below 1.0 (or a non-finite one) degenerates to a flat
    /// `initial_delay`; the result is always capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let flat = self.initial_delay.min(self.max_delay);
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return flat;
        }
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        if !factor.is_finite() || factor <= 0.0 {
            return flat;
        }
        let scaled = Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX);
        scaled.min(self.max_delay)
    }

    /// Applies the configured jitter factor to a computed delay.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        match self.jitter {
            Some(bounds) if !delay.is_zero() => {
                let factor = rand::thread_rng().gen_range(bounds.low()..=bounds.high());
                Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
                    .unwrap_or(Duration::MAX)
            }
            _ => delay,
        }
    }

    /// Jittered backoff delay after the 0-based `attempt` has failed.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.jittered(self.delay_for_attempt(attempt))
    }

    /// Runs `op` with retries, treating every failure as retryable.
    ///
    /// # Errors
    ///
    /// See [`RetryError`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(cancel, op, |_| true, |_, _| {}).await
    }

    /// Runs `op` with retries, a retryability classifier, and a retry hook.
    ///
    /// `op` receives the 0-based attempt index. A failure rejected by `retryable`
    /// surfaces immediately as [`RetryError::NotRetryable`]. `on_retry(attempt,
    /// error)` fires before each backoff sleep, for observability only; it cannot
    /// affect control flow.
    ///
    /// Cancellation is honored during the backoff sleep. An in-flight `op` future
    /// is never aborted here: whether `execute` itself is cancel-safe is the
    /// caller's concern.
    ///
    /// # Errors
    ///
    /// See [`RetryError`].
    pub async fn execute_with<T, E, F, Fut, R, H>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        retryable: R,
        mut on_retry: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        H: FnMut(u32, &E),
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let attempts = attempt + 1;
                    if !retryable(&error) {
                        return Err(RetryError::NotRetryable { attempt: attempts, source: error });
                    }
                    if attempts >= budget {
                        return Err(RetryError::Exhausted { attempts, source: error });
                    }
                    on_retry(attempts, &error);
                    tokio::select! {
                        () = cancel.cancelled() => {
                            return Err(RetryError::Cancelled { attempts });
                        }
                        () = tokio::time::sleep(self.backoff_delay(attempt)) => {}
                    }
                    attempt = attempts;
                }
            }
        }
    }
}

/// Terminal outcomes of a retry loop.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; wraps the final failure.
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: E },

    /// The classifier ruled the failure non-retryable.
    #[error("non-retryable failure on attempt {attempt}: {source}")]
    NotRetryable { attempt: u32, source: E },

    /// The cancellation token fired during a backoff sleep.
    #[error("retry cancelled during backoff after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Attempts consumed before this outcome.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
            Self::NotRetryable { attempt, .. } => *attempt,
        }
    }

    /// The final underlying failure, when one was observed.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. } | Self::NotRetryable { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}
