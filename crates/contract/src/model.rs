//! Contract data model.
//!
//! Every section is a typed serde struct with explicit defaults, so the runtime
//! never re-checks configuration shape at call time. A contract is read-only once
//! constructed: there is no `&mut` API, and the runtime shares it behind `Arc`
//! without further synchronization.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ContractError, Result};

/// Declarative description of one external integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Contract name, carried through logs and error reports.
    pub name: String,
    pub version: ContractVersion,
    pub protocol: ProtocolConfig,
    pub connection: ConnectionConfig,
    /// Credential material, consumed by the handler. Opaque to the runtime.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    /// Named operations. Must be non-empty; names are unique by construction.
    pub operations: HashMap<String, Operation>,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Contract {
    /// Parses a contract from a JSON document and runs load-time validation.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Json` on malformed input and
    /// `ContractError::Invalid` when a load-time invariant fails.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let contract: Self = serde_json::from_str(raw)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Parses a contract from an in-memory JSON value.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Contract::from_json_str`].
    pub fn from_json_value(raw: Value) -> Result<Self> {
        let contract: Self = serde_json::from_value(raw)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Parses a contract from a YAML document and runs load-time validation.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Yaml` on malformed input and
    /// `ContractError::Invalid` when a load-time invariant fails.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let contract: Self = serde_yaml::from_str(raw)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Looks up an operation by name.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Load-time invariant checks. Every `from_*` constructor runs this; call it
    /// directly when assembling a contract in code.
    ///
    /// Resilience sections are checked whenever present, even with
    /// `enabled: false`, so configuration typos surface at load rather than on the
    /// day the section gets switched on.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(self.invalid("contract declares no operations"));
        }
        match (&self.connection.url, &self.connection.host) {
            (None, None) => {
                return Err(self.invalid("connection requires either url or host"));
            }
            (Some(_), Some(_)) => {
                return Err(self.invalid("connection must set url or host, not both"));
            }
            _ => {}
        }
        if self.connection.port.is_some() && self.connection.host.is_none() {
            return Err(self.invalid("connection.port requires connection.host"));
        }
        let pool = self.connection.pool;
        if pool.max == 0 || pool.max < pool.min {
            return Err(self.invalid(
                "connection.pool.max must be at least pool.min and at least 1",
            ));
        }
        if let Some(retry) = &self.resilience.retry {
            if retry.max_attempts == 0 {
                return Err(self.invalid("resilience.retry.max_attempts must be at least 1"));
            }
            if retry.max_delay_ms < retry.initial_delay_ms {
                return Err(self.invalid(
                    "resilience.retry.max_delay_ms must be at least initial_delay_ms",
                ));
            }
            if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
                return Err(self.invalid(
                    "resilience.retry.backoff_multiplier must be at least 1.0",
                ));
            }
        }
        if let Some(breaker) = &self.resilience.circuit_breaker {
            if breaker.failure_threshold == 0 {
                return Err(self.invalid(
                    "resilience.circuit_breaker.failure_threshold must be at least 1",
                ));
            }
            if breaker.success_threshold == 0 {
                return Err(self.invalid(
                    "resilience.circuit_breaker.success_threshold must be at least 1",
                ));
            }
            if breaker.half_open_max_calls == 0 {
                return Err(self.invalid(
                    "resilience.circuit_breaker.half_open_max_calls must be at least 1",
                ));
            }
        }
        if let Some(rate) = &self.resilience.rate_limit {
            if !rate.requests_per_second.is_finite() || rate.requests_per_second <= 0.0 {
                return Err(self.invalid(
                    "resilience.rate_limit.requests_per_second must be positive",
                ));
            }
            if rate.burst_size == 0 {
                return Err(self.invalid("resilience.rate_limit.burst_size must be at least 1"));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> ContractError {
        ContractError::Invalid { contract: self.name.clone(), reason: reason.into() }
    }
}

/// Semantic contract version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContractVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol family. Its string form keys the handler registry.
    #[serde(rename = "type")]
    pub kind: ProtocolKind,
}

/// Protocol families with first-class names, plus a catch-all for out-of-tree
/// handlers registered under custom discriminators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Http,
    Graph,
    Relational,
    MessageBus,
    #[serde(untagged)]
    Other(String),
}

impl ProtocolKind {
    /// Registry key for handler lookup.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Graph => "graph",
            Self::Relational => "relational",
            Self::MessageBus => "message_bus",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to reach the integration. `url` and `host`/`port` are alternatives; which
/// one applies is protocol-specific, and load-time validation requires exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Per-call budget handed to the handler via the request envelope.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub tls: bool,
    /// Handler-specific connection parameters, passed through opaquely.
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

/// Connection pool bounds. Advisory: the handler owns the actual pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_min")]
    pub min: u32,
    #[serde(default = "default_pool_max")]
    pub max: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min: default_pool_min(), max: default_pool_max() }
    }
}

/// Credential material for the integration, tagged by `type`. The runtime treats
/// it as opaque; handlers translate it into protocol-specific credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
    Header { name: String, value: String },
    Query { name: String, value: String },
}

/// One named, callable action within a contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub description: Option<String>,
    /// Protocol-specific request template. Opaque to the runtime: it reaches the
    /// handler untouched and is never inspected in between.
    #[serde(default)]
    pub request: Value,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

/// How a raw handler response becomes this operation's output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Status codes that count as success. Empty: the handler's `success` flag
    /// alone decides.
    #[serde(default)]
    pub success_codes: Vec<u16>,
    /// Output field name to path expression, evaluated by the response mapper.
    /// Empty: the raw data payload passes through unmapped.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

/// Input validation rules for one operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Fields that must be present and non-null, checked in declaration order.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Field name to expected JSON type, checked for fields that are present.
    #[serde(default)]
    pub field_types: BTreeMap<String, FieldType>,
}

impl ValidationRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required_fields.is_empty() && self.field_types.is_empty()
    }
}

/// JSON types an operation may require of its input fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// Wildcard: accepts every value.
    Any,
}

impl FieldType {
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retryability classification for handler failures.
///
/// Patterns match an error's code (case-insensitive, exact) or its message
/// (case-insensitive substring). The deny-list wins when both sides match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandling {
    /// Allow-list: when non-empty, only matching failures are retried.
    #[serde(default)]
    pub retryable_errors: Vec<String>,
    /// Deny-list: matching failures are never retried.
    #[serde(default)]
    pub non_retryable_errors: Vec<String>,
}

impl ErrorHandling {
    /// Whether a failure with this code/message should be retried.
    ///
    /// With both lists empty every failure is retryable, which keeps retry
    /// behavior governed purely by the retry section's attempt budget.
    #[must_use]
    pub fn is_retryable(&self, code: Option<&str>, message: &str) -> bool {
        if matches_any(&self.non_retryable_errors, code, message) {
            return false;
        }
        if self.retryable_errors.is_empty() {
            return true;
        }
        matches_any(&self.retryable_errors, code, message)
    }
}

fn matches_any(patterns: &[String], code: Option<&str>, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    patterns.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        code.is_some_and(|code| code.eq_ignore_ascii_case(&pattern))
            || message.contains(&pattern)
    })
}

/// Resilience policy sections. An absent section leaves that feature disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

/// Retry with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Total attempt budget, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap applied to every computed delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Scale each delay by a uniform random factor in [0.5, 1.0].
    #[serde(default = "default_enabled")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Circuit breaker over consecutive failures. One breaker per contract: it
/// measures dependency health, not per-operation health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Consecutive failures that trip the breaker open.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Cooldown before an open breaker admits a probe.
    #[serde(default = "default_breaker_timeout_ms")]
    pub timeout_ms: u64,
    /// Probe budget while half-open.
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_breaker_timeout_ms(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

/// Token-bucket rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sustained refill rate.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    /// Bucket capacity: calls admitted instantly from a cold start.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// Upper bound on how long one call may wait for tokens. Absent: unbounded.
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            max_wait_ms: None,
        }
    }
}

/// Observability knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Header name under which the correlation id rides on outgoing requests.
    #[serde(default)]
    pub correlation_header: Option<String>,
    /// Log raw response payloads at debug level.
    #[serde(default)]
    pub log_payloads: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_pool_min() -> u32 {
    1
}

fn default_pool_max() -> u32 {
    8
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_ms() -> u64 {
    60_000
}

fn default_half_open_max_calls() -> u32 {
    1
}

fn default_requests_per_second() -> f64 {
    10.0
}

fn default_burst_size() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn minimal_contract() -> Value {
        json!({
            "name": "orders",
            "version": {"major": 1, "minor": 0, "patch": 0},
            "protocol": {"type": "http"},
            "connection": {"url": "https://orders.internal"},
            "operations": {
                "get_order": {
                    "request": {"method": "GET", "path": "/orders/{id}"}
                }
            }
        })
    }

    #[test]
    fn minimal_contract_parses_with_defaults() {
        let contract = Contract::from_json_value(minimal_contract()).unwrap();

        assert_eq!(contract.name, "orders");
        assert_eq!(contract.version.to_string(), "1.0.0");
        assert_eq!(contract.protocol.kind, ProtocolKind::Http);
        assert_eq!(contract.connection.timeout_ms, 30_000);
        assert_eq!(contract.connection.pool.min, 1);
        assert_eq!(contract.connection.pool.max, 8);
        assert!(!contract.connection.tls);
        assert!(contract.auth.is_none());
        assert!(contract.resilience.retry.is_none());
        assert!(contract.resilience.circuit_breaker.is_none());
        assert!(contract.resilience.rate_limit.is_none());

        let op = contract.operation("get_order").unwrap();
        assert!(op.response.success_codes.is_empty());
        assert!(op.response.mapping.is_empty());
        assert!(op.validation.is_empty());
        assert!(op.error_handling.retryable_errors.is_empty());
    }

    #[test]
    fn full_contract_parses_from_yaml() {
        let raw = r#"
name: payments
version: {major: 2, minor: 3, patch: 1}
protocol:
  type: http
connection:
  url: https://payments.internal
  timeout_ms: 5000
  tls: true
  pool: {min: 2, max: 16}
  base_path: /v2
auth:
  type: bearer
  token: secret-token
operations:
  charge:
    description: Charge a stored payment method
    request:
      method: POST
      path: /charges
    response:
      success_codes: [200, 201]
      mapping:
        id: "$.charge.id"
        amount: "$.charge.amount ?? 0"
    validation:
      required_fields: [customer_id, amount]
      field_types:
        amount: number
        customer_id: string
    error_handling:
      retryable_errors: ["503", "timeout"]
      non_retryable_errors: ["401"]
resilience:
  retry:
    max_attempts: 5
    initial_delay_ms: 50
    max_delay_ms: 2000
    backoff_multiplier: 3.0
    jitter: false
  circuit_breaker:
    failure_threshold: 3
    timeout_ms: 1000
  rate_limit:
    requests_per_second: 25.0
    burst_size: 50
    max_wait_ms: 200
observability:
  correlation_header: x-correlation-id
"#;
        let contract = Contract::from_yaml_str(raw).unwrap();

        assert_eq!(contract.connection.timeout_ms, 5000);
        assert!(contract.connection.tls);
        assert_eq!(
            contract.connection.options.get("base_path"),
            Some(&json!("/v2")),
        );
        assert!(matches!(contract.auth, Some(AuthConfig::Bearer { .. })));

        let op = contract.operation("charge").unwrap();
        assert_eq!(op.response.success_codes, vec![200, 201]);
        assert_eq!(op.validation.required_fields, vec!["customer_id", "amount"]);
        assert_eq!(op.validation.field_types["amount"], FieldType::Number);

        let retry = contract.resilience.retry.as_ref().unwrap();
        assert!(retry.enabled);
        assert_eq!(retry.max_attempts, 5);
        assert!(!retry.jitter);

        let breaker = contract.resilience.circuit_breaker.as_ref().unwrap();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.success_threshold, 2);
        assert_eq!(breaker.timeout_ms, 1000);
        assert_eq!(breaker.half_open_max_calls, 1);

        let rate = contract.resilience.rate_limit.as_ref().unwrap();
        assert_eq!(rate.burst_size, 50);
        assert_eq!(rate.max_wait_ms, Some(200));

        assert_eq!(
            contract.observability.correlation_header.as_deref(),
            Some("x-correlation-id"),
        );
    }

    #[test]
    fn custom_protocol_kind_round_trips() {
        let kind: ProtocolKind = serde_json::from_value(json!("ledger_rpc")).unwrap();
        assert_eq!(kind, ProtocolKind::Other("ledger_rpc".to_string()));
        assert_eq!(kind.as_str(), "ledger_rpc");
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("ledger_rpc"));

        let known: ProtocolKind = serde_json::from_value(json!("message_bus")).unwrap();
        assert_eq!(known, ProtocolKind::MessageBus);
    }

    #[test]
    fn auth_variants_parse_by_tag() {
        let basic: AuthConfig =
            serde_json::from_value(json!({"type": "basic", "username": "u", "password": "p"}))
                .unwrap();
        assert!(matches!(basic, AuthConfig::Basic { .. }));

        let query: AuthConfig =
            serde_json::from_value(json!({"type": "query", "name": "api_key", "value": "k"}))
                .unwrap();
        assert!(matches!(query, AuthConfig::Query { .. }));

        let none: AuthConfig = serde_json::from_value(json!({"type": "none"})).unwrap();
        assert!(matches!(none, AuthConfig::None));
    }

    fn expect_invalid(mut doc: Value, patch: impl FnOnce(&mut Value)) -> String {
        patch(&mut doc);
        match Contract::from_json_value(doc) {
            Err(ContractError::Invalid { reason, .. }) => reason,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn load_time_validation_rejects_bad_contracts() {
        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["operations"] = json!({});
        });
        assert!(reason.contains("no operations"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["connection"] = json!({"host": "db.internal"});
            doc["connection"]["url"] = json!("https://db.internal");
        });
        assert!(reason.contains("not both"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["connection"] = json!({"url": "https://x", "port": 5432});
        });
        assert!(reason.contains("port"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"retry": {"max_attempts": 0}});
        });
        assert!(reason.contains("max_attempts"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] =
                json!({"retry": {"initial_delay_ms": 500, "max_delay_ms": 100}});
        });
        assert!(reason.contains("max_delay_ms"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"retry": {"backoff_multiplier": 0.5}});
        });
        assert!(reason.contains("backoff_multiplier"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"circuit_breaker": {"failure_threshold": 0}});
        });
        assert!(reason.contains("failure_threshold"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"rate_limit": {"requests_per_second": 0.0}});
        });
        assert!(reason.contains("requests_per_second"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"rate_limit": {"burst_size": 0}});
        });
        assert!(reason.contains("burst_size"));

        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["connection"]["pool"] = json!({"min": 4, "max": 2});
        });
        assert!(reason.contains("pool"));
    }

    #[test]
    fn disabled_sections_are_still_checked() {
        let reason = expect_invalid(minimal_contract(), |doc| {
            doc["resilience"] = json!({"retry": {"enabled": false, "max_attempts": 0}});
        });
        assert!(reason.contains("max_attempts"));
    }

    #[test]
    fn retryability_deny_list_wins() {
        let policy = ErrorHandling {
            retryable_errors: vec!["503".to_string(), "timeout".to_string()],
            non_retryable_errors: vec!["timeout".to_string()],
        };
        assert!(policy.is_retryable(Some("503"), "service unavailable"));
        assert!(!policy.is_retryable(None, "connect TIMEOUT after 5s"));
        assert!(!policy.is_retryable(Some("500"), "internal error"));
    }

    #[test]
    fn retryability_defaults_to_true_with_empty_lists() {
        let policy = ErrorHandling::default();
        assert!(policy.is_retryable(Some("anything"), "boom"));

        let deny_only = ErrorHandling {
            retryable_errors: Vec::new(),
            non_retryable_errors: vec!["401".to_string()],
        };
        assert!(deny_only.is_retryable(Some("503"), "unavailable"));
        assert!(!deny_only.is_retryable(Some("401"), "unauthorized"));
    }

    #[test]
    fn field_type_matching() {
        assert!(FieldType::Integer.matches(&json!(7)));
        assert!(!FieldType::Integer.matches(&json!(7.5)));
        assert!(FieldType::Number.matches(&json!(7.5)));
        assert!(FieldType::Any.matches(&json!(null)));
        assert!(FieldType::Object.matches(&json!({})));
        assert!(!FieldType::Array.matches(&json!({})));
    }

    #[test]
    fn versions_order_numerically() {
        let a = ContractVersion { major: 1, minor: 2, patch: 3 };
        let b = ContractVersion { major: 1, minor: 10, patch: 0 };
        assert!(a < b);
        assert_eq!(b.to_string(), "1.10.0");
    }
}
