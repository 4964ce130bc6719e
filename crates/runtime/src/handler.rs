//! The protocol handler seam.
//!
//! The runtime performs no I/O of its own. Everything that touches the
//! network lives behind [`ProtocolHandler`], injected per protocol through
//! the [`HandlerRegistry`](crate::registry::HandlerRegistry).

use async_trait::async_trait;
use ballast_contract::model::{Contract, Operation};
use thiserror::Error;

use crate::protocol::{ProtocolRequest, ProtocolResponse};

/// Failure reported by a protocol handler.
///
/// `code` is the handler's machine-readable failure class (an HTTP status, a
/// driver error code, `"timeout"`); the contract's `error_handling` section
/// matches against it to decide retryability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: Option<String>,
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Capability contract for I/O-performing protocol adapters.
///
/// Only [`execute`](Self::execute) runs on the dispatch path.
/// [`initialize`](Self::initialize) runs once when a registry opens a
/// contract; [`health_check`](Self::health_check) and
/// [`shutdown`](Self::shutdown) surface through the runtime's own health and
/// lifecycle API.
///
/// Handlers own timeout enforcement: `execute` must resolve within
/// `request.timeout_ms`, answering with a timeout-shaped failure when the
/// dependency does not. Retried calls re-invoke `execute` with the same
/// envelope, so side-effecting operations should be idempotent where the
/// underlying protocol allows it.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Establishes whatever the handler needs for this contract: connection
    /// pools, sessions, channel topology.
    async fn initialize(&self, _contract: &Contract) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Performs one call.
    ///
    /// # Errors
    ///
    /// Transport-level failures (unreachable host, timeout, protocol
    /// violation) are `Err`. A reachable dependency answering unhappily may
    /// instead be an `Ok` response with `success: false`; both routes feed
    /// the same retry and breaker accounting.
    async fn execute(
        &self,
        request: &ProtocolRequest,
        operation: &Operation,
    ) -> Result<ProtocolResponse, HandlerError>;

    /// Liveness of the underlying dependency.
    async fn health_check(&self) -> bool {
        true
    }

    /// Releases connections and sessions.
    async fn shutdown(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_message_only() {
        let error = HandlerError::with_code("503", "service unavailable");
        assert_eq!(error.to_string(), "service unavailable");
        assert_eq!(error.code(), Some("503"));
    }

    #[test]
    fn bare_error_has_no_code() {
        assert_eq!(HandlerError::new("boom").code(), None);
    }
}
