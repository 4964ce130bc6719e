//! Resilience primitives for effect dispatch.
//!
//! Three building blocks, each usable on its own and composed by
//! `ballast-runtime` in this order:
//!
//! ```text
//!   caller -> RateLimiter::acquire -> CircuitBreaker::is_open -> RetryPolicy::execute -> I/O
//! ```
//!
//! All primitives are `Send + Sync`: mutable state sits behind `parking_lot`
//! locks that are never held across an await, and every suspension point races a
//! `CancellationToken`. Time comes from `tokio::time`, so paused-clock tests can
//! drive cooldowns and refills deterministically.

pub mod breaker;
pub mod limiter;
pub mod retry;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use limiter::{AcquireError, RateLimiter};
pub use retry::{JitterBounds, RetryError, RetryPolicy};
