//! Protocol-agnostic request and response envelopes.
//!
//! These are the only types that cross the runtime/handler boundary. The
//! runtime assembles a [`ProtocolRequest`] from validated caller input and the
//! contract's connection settings; handlers answer with a
//! [`ProtocolResponse`] regardless of what transport they spoke.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One dispatched call, as handed to a protocol handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRequest {
    /// Operation name within the contract.
    pub operation: String,
    /// Caller parameters, already validated against the operation's rules.
    pub params: Map<String, Value>,
    /// Transport metadata: the correlation header when the contract declares
    /// one, plus any caller-supplied extras.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-call budget, in milliseconds. Handlers enforce this themselves and
    /// report overruns as timeout-shaped failures.
    pub timeout_ms: u64,
    /// Caller-supplied or generated id, carried through logs and errors.
    pub correlation_id: String,
}

/// Raw handler outcome, before response mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolResponse {
    /// The handler's own verdict. Operations may tighten it further through
    /// their declared success codes.
    pub success: bool,
    /// Transport status, where the protocol has one (HTTP status, driver
    /// error class). Feeds retryability classification.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Payload the response mapper evaluates against.
    #[serde(default)]
    pub data: Option<Value>,
    /// Failure detail for unsuccessful responses.
    #[serde(default)]
    pub error: Option<String>,
    /// Time the handler spent on the wire, self-reported.
    #[serde(default)]
    pub duration_ms: u64,
    /// Handler extras surfaced verbatim on the outcome (rate-limit headers,
    /// node ids, cache flags).
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ProtocolResponse {
    /// Successful response carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// Failed response carrying an error message.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Sets the transport status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the self-reported wire duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ok_response_carries_data_and_defaults() {
        let response = ProtocolResponse::ok(json!({"id": 7})).with_status(200);
        assert!(response.success);
        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.data, Some(json!({"id": 7})));
        assert_eq!(response.error, None);
    }

    #[test]
    fn failed_response_carries_error() {
        let response = ProtocolResponse::failed("connection reset").with_status(502);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("connection reset"));
        assert_eq!(response.status_code, Some(502));
    }

    #[test]
    fn response_deserializes_with_sparse_fields() {
        let response: ProtocolResponse =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(response.success);
        assert_eq!(response.status_code, None);
        assert_eq!(response.duration_ms, 0);
        assert!(response.metadata.is_empty());
    }
}
