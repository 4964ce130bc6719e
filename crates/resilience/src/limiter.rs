//! Token-bucket rate limiter.
//!
//! Refill is computed lazily from elapsed monotonic time at each acquire
//! attempt; there is no background refill task. The bucket starts full, so a
//! cold limiter admits a full burst instantly. Waiters sleep outside the lock
//! and re-check on wake, because concurrent acquirers may have consumed the
//! refill first.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Why an acquire gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The request can never be satisfied: it exceeds bucket capacity.
    #[error("requested {requested} token(s) exceeds burst capacity {capacity}")]
    ExceedsBurst { requested: u32, capacity: u32 },

    /// The bounded-wait budget cannot cover the remaining wait.
    #[error("rate limit wait exceeded the {budget_ms}ms budget")]
    TimedOut { budget_ms: u64 },

    /// The cancellation token fired while waiting for tokens.
    #[error("rate limit wait cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with lazy refill.
///
/// Shared by every operation of a contract; all state sits under one mutex that
/// is never held across an await.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `requests_per_second` is the sustained refill rate, `burst_size` the
    /// bucket capacity. Non-positive or non-finite rates are clamped to one
    /// request per second and a zero burst to one.
    #[must_use]
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        let rate = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };
        let burst = burst_size.max(1);
        let capacity = f64::from(burst);
        Self {
            rate,
            capacity,
            burst,
            bucket: Mutex::new(Bucket { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    /// Immediate attempt for one token.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_n(1)
    }

    /// Immediate attempt for `n` tokens; consumes them only on success.
    #[must_use]
    pub fn try_acquire_n(&self, n: u32) -> bool {
        let needed = f64::from(n);
        if needed > self.capacity {
            return false;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= needed {
            bucket.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Waits for one token. See [`RateLimiter::acquire_n`].
    ///
    /// # Errors
    ///
    /// See [`RateLimiter::acquire_n`].
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        self.acquire_n(1, cancel).await
    }

    /// Waits until `n` tokens are available, then consumes them.
    ///
    /// # Errors
    ///
    /// [`AcquireError::ExceedsBurst`] when `n` exceeds capacity;
    /// [`AcquireError::Cancelled`] when the token fires during a wait.
    pub async fn acquire_n(
        &self,
        n: u32,
        cancel: &CancellationToken,
    ) -> Result<(), AcquireError> {
        self.acquire_inner(n, None, cancel).await
    }

    /// Bounded-wait variant of [`RateLimiter::acquire_n`].
    ///
    /// Fails fast: tokens accrue at a known rate and competitors only consume
    /// them, so once the optimistic wait estimate exceeds the remaining budget
    /// the timeout is certain.
    ///
    /// # Errors
    ///
    /// As [`RateLimiter::acquire_n`], plus [`AcquireError::TimedOut`].
    pub async fn acquire_n_timeout(
        &self,
        n: u32,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), AcquireError> {
        self.acquire_inner(n, Some(max_wait), cancel).await
    }

    async fn acquire_inner(
        &self,
        n: u32,
        max_wait: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), AcquireError> {
        let needed = f64::from(n);
        if needed > self.capacity {
            return Err(AcquireError::ExceedsBurst { requested: n, capacity: self.burst });
        }
        // A budget too large for the clock to represent is as good as unbounded.
        let deadline = max_wait.and_then(|budget| Instant::now().checked_add(budget));
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= needed {
                    bucket.tokens -= needed;
                    return Ok(());
                }
                // Saturates at tiny rates, where the estimate exceeds what a
                // `Duration` can hold.
                Duration::try_from_secs_f64((needed - bucket.tokens) / self.rate)
                    .unwrap_or(Duration::MAX)
            };
            if let Some(deadline) = deadline
                && wait > deadline.saturating_duration_since(Instant::now())
            {
                let budget_ms =
                    max_wait.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
                return Err(AcquireError::TimedOut { budget_ms });
            }
            let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
            trace!(wait_ms, "rate limiter waiting for tokens");
            tokio::select! {
                () = cancel.cancelled() => return Err(AcquireError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Tokens currently available after a refill, for diagnostics.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
            bucket.last_refill = now;
        }
    }
}
