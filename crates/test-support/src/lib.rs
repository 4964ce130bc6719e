//! Contract document fixtures shared across integration tests.
//!
//! Everything here produces plain JSON values; tests feed them through
//! `Contract::from_json_value` so fixtures stay decoupled from the model
//! types and survive schema additions with defaults.

use serde_json::{Value, json};

/// Minimal valid contract document: one pass-through operation named `echo`,
/// no resilience sections.
#[must_use]
pub fn minimal_contract_doc(name: &str) -> Value {
    contract_doc(name, json!({"echo": {}}), json!({}))
}

/// Contract document with explicit operations and resilience sections.
#[must_use]
pub fn contract_doc(name: &str, operations: Value, resilience: Value) -> Value {
    json!({
        "name": name,
        "version": {"major": 1, "minor": 0, "patch": 0},
        "protocol": {"type": "http"},
        "connection": {
            "url": format!("https://{name}.test.internal"),
            "timeout_ms": 5000
        },
        "operations": operations,
        "resilience": resilience
    })
}

/// Retry section with jitter disabled, so backoff timing is deterministic.
#[must_use]
pub fn retry_section(max_attempts: u32, initial_delay_ms: u64) -> Value {
    json!({
        "enabled": true,
        "max_attempts": max_attempts,
        "initial_delay_ms": initial_delay_ms,
        // Load-time validation requires max_delay_ms >= initial_delay_ms.
        "max_delay_ms": initial_delay_ms.max(30_000),
        "backoff_multiplier": 2.0,
        "jitter": false
    })
}

/// Circuit breaker section with a single half-open probe slot.
#[must_use]
pub fn breaker_section(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> Value {
    json!({
        "enabled": true,
        "failure_threshold": failure_threshold,
        "success_threshold": success_threshold,
        "timeout_ms": timeout_ms,
        "half_open_max_calls": 1
    })
}

/// Rate limit section without a wait bound.
#[must_use]
pub fn rate_limit_section(requests_per_second: f64, burst_size: u32) -> Value {
    json!({
        "enabled": true,
        "requests_per_second": requests_per_second,
        "burst_size": burst_size
    })
}
