//! Consecutive-failure circuit breaker.
//!
//! One instance guards one dependency and is shared by every operation calling
//! it. `is_open` is the admission check and owns two transitions: OPEN to
//! HALF_OPEN once the cooldown elapses, and probe budgeting while HALF_OPEN.
//! Callers must follow every admitted call with exactly one
//! `record_success`/`record_failure`, recording the final outcome of the call
//! (a retried call records once, not per attempt).

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time breaker counters, for health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker with a consecutive-failure trip condition.
///
/// All state sits under one mutex so admission checks and outcome recording
/// observe consistent snapshots under concurrency. No lock is ever held across
/// an await; none of the methods suspend.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    half_open_max_calls: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// `failure_threshold` consecutive failures trip the breaker open; after
    /// `cooldown` it admits up to `half_open_max_calls` probes, and
    /// `success_threshold` probe successes close it again. Zero thresholds are
    /// bumped to one.
    #[must_use]
    pub fn new(
        failure_threshold: u32,
        success_threshold: u32,
        cooldown: Duration,
        half_open_max_calls: u32,
    ) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            cooldown,
            half_open_max_calls: half_open_max_calls.max(1),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Admission check: true means the call must be rejected.
    ///
    /// Not a pure accessor. An expired cooldown transitions OPEN to HALF_OPEN
    /// here and admits the caller as the first probe, and every HALF_OPEN
    /// admission consumes one probe slot.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if !cooled_down {
                    return true;
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.half_open_calls = 1;
                false
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.half_open_max_calls {
                    inner.half_open_calls += 1;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Records a successful admitted call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                // The probe completed, freeing its slot; recovery may need
                // several sequential probes when the success threshold
                // exceeds the concurrent probe budget.
                inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            // A probe success landing after another probe already reopened the
            // circuit carries no signal about the new OPEN window.
            CircuitState::Open => {}
        }
    }

    /// Records a failed admitted call (the final outcome, retries included).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.last_failure_at = Some(Instant::now());
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.last_failure_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                // Late probe failure: restart the cooldown window.
                inner.last_failure_at = Some(Instant::now());
            }
        }
    }

    /// Current state, without admission side effects.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consistent view of the internal counters.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.success_count = 0;
        inner.half_open_calls = 0;
        match to {
            CircuitState::Closed => {
                inner.failure_count = 0;
                info!(from = %from, "circuit breaker closed");
            }
            CircuitState::HalfOpen => {
                info!(from = %from, probes = self.half_open_max_calls, "circuit breaker admitting probes");
            }
            CircuitState::Open => {
                warn!(
                    from = %from,
                    failures = inner.failure_count,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
        }
    }
}
