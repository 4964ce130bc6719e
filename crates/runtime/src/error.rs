//! Error types for effect execution.

use ballast_contract::validate::ValidationError;
use thiserror::Error;

use crate::handler::HandlerError;

/// Result alias for effect execution.
pub type Result<T> = std::result::Result<T, EffectError>;

/// Structured failure of one execute call.
///
/// Always carries the operation name, the correlation id, and how many
/// handler attempts were consumed. `attempts` is zero when the failure
/// preceded dispatch (unknown operation, validation, admission control).
#[derive(Debug, Error)]
#[error("operation '{operation}' failed (correlation {correlation_id}, attempts {attempts}): {kind}")]
pub struct EffectError {
    pub operation: String,
    pub correlation_id: String,
    pub attempts: u32,
    pub kind: EffectErrorKind,
}

/// Why an effect execution failed.
#[derive(Debug, Error)]
pub enum EffectErrorKind {
    /// The contract declares no such operation. The handler was never
    /// invoked.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// Input failed the operation's validation rules. The handler was never
    /// invoked.
    #[error("input validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The circuit breaker is open; the dependency is cooling down.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The bounded rate-limit wait ran out before a token freed up.
    #[error("rate limit admission exceeded the {budget_ms}ms wait budget")]
    RateLimitTimeout { budget_ms: u64 },

    /// Every retry attempt failed; wraps the final handler failure.
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: HandlerError,
    },

    /// The handler failed and retry did not apply, either because the
    /// contract disables it or the failure classified as non-retryable.
    #[error("handler execution failed: {0}")]
    Handler(#[from] HandlerError),

    /// A cancellation token fired before dispatch settled.
    #[error("execution cancelled")]
    Cancelled,
}

/// Errors from opening a contract through a handler registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No factory is registered under the contract's protocol discriminator.
    #[error("no handler registered for protocol '{0}'")]
    UnknownProtocol(String),

    /// The handler was built but rejected the contract during initialization.
    #[error("handler initialization failed: {0}")]
    Initialize(#[from] HandlerError),
}
