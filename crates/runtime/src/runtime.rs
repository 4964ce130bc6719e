//! The effect runtime.
//!
//! One runtime executes one contract against one injected handler, enforcing
//! the contract's resilience policy in a fixed order:
//!
//! ```text
//! lookup -> validate -> rate limit -> circuit breaker -> retry(handler) -> map
//! ```
//!
//! Failures before dispatch (unknown operation, invalid input, admission
//! refusals) resolve locally: the handler is never invoked and the breaker's
//! accounting never moves. An admitted dispatch records exactly one breaker
//! outcome, after retries settle. Metrics record every call either way.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ballast_contract::model::{Contract, Operation, RetryConfig};
use ballast_contract::validate::{self, ValidationError};
use ballast_resilience::breaker::{CircuitBreaker, CircuitState};
use ballast_resilience::limiter::{AcquireError, RateLimiter};
use ballast_resilience::retry::{JitterBounds, RetryError, RetryPolicy};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EffectError, EffectErrorKind};
use crate::handler::{HandlerError, ProtocolHandler};
use crate::mapping::ResponseMapping;
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::protocol::{ProtocolRequest, ProtocolResponse};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Correlation id carried through logs, the request envelope, and errors.
    /// A UUID is generated when absent.
    pub correlation_id: Option<String>,
    /// Extra transport headers merged into the request envelope.
    pub headers: BTreeMap<String, String>,
    /// Caller-owned cancellation. When absent, the call is governed by the
    /// runtime's own lifetime token.
    pub cancellation: Option<CancellationToken>,
}

/// Successful outcome of one execute call.
#[derive(Debug, Clone)]
pub struct EffectOutcome {
    pub operation: String,
    pub correlation_id: String,
    /// Mapped output, or the raw payload when the operation maps nothing.
    pub output: Value,
    pub status_code: Option<u16>,
    /// Handler attempts consumed, retries included.
    pub attempts: u32,
    /// End-to-end time inside the runtime, admission waits included.
    pub duration: Duration,
    pub metadata: BTreeMap<String, Value>,
}

/// Composite health view: a live handler probe plus local state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub handler_healthy: bool,
    /// Absent when the contract configures no breaker.
    pub circuit_breaker_state: Option<CircuitState>,
    pub metrics: MetricsSnapshot,
}

struct RuntimeInner {
    contract: Arc<Contract>,
    handler: Arc<dyn ProtocolHandler>,
    retry: Option<RetryPolicy>,
    breaker: Option<CircuitBreaker>,
    limiter: Option<RateLimiter>,
    limiter_budget: Option<Duration>,
    mappings: HashMap<String, ResponseMapping>,
    metrics: MetricsRecorder,
    cancel: CancellationToken,
}

/// Executes one contract's operations against an injected handler.
///
/// Cheap to clone; clones share the breaker, limiter, metrics, and lifetime
/// token, so resilience state is consistent across every caller of the same
/// runtime.
#[derive(Clone)]
pub struct EffectRuntime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for EffectRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRuntime")
            .field("contract", &self.inner.contract.name)
            .finish_non_exhaustive()
    }
}

impl EffectRuntime {
    /// Assembles a runtime from a validated contract and a handler.
    ///
    /// Resilience primitives are built here from the contract's enabled
    /// sections, and response mappings compile once per operation. Disabled
    /// or absent sections cost nothing at call time.
    #[must_use]
    pub fn new(contract: Contract, handler: Arc<dyn ProtocolHandler>) -> Self {
        let resilience = &contract.resilience;
        let retry = resilience
            .retry
            .as_ref()
            .filter(|config| config.enabled)
            .map(retry_policy);
        let breaker = resilience
            .circuit_breaker
            .as_ref()
            .filter(|config| config.enabled)
            .map(|config| {
                CircuitBreaker::new(
                    config.failure_threshold,
                    config.success_threshold,
                    Duration::from_millis(config.timeout_ms),
                    config.half_open_max_calls,
                )
            });
        let rate = resilience
            .rate_limit
            .as_ref()
            .filter(|config| config.enabled);
        let limiter = rate.map(|config| {
            RateLimiter::new(config.requests_per_second, config.burst_size)
        });
        let limiter_budget = rate
            .and_then(|config| config.max_wait_ms)
            .map(Duration::from_millis);
        let mappings = contract
            .operations
            .iter()
            .filter(|(_, operation)| !operation.response.mapping.is_empty())
            .map(|(name, operation)| {
                (name.clone(), ResponseMapping::compile(&operation.response.mapping))
            })
            .collect();

        Self {
            inner: Arc::new(RuntimeInner {
                contract: Arc::new(contract),
                handler,
                retry,
                breaker,
                limiter,
                limiter_budget,
                mappings,
                metrics: MetricsRecorder::default(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// The contract this runtime executes.
    #[must_use]
    pub fn contract(&self) -> &Contract {
        &self.inner.contract
    }

    /// Executes an operation with default options.
    ///
    /// # Errors
    /// See [`execute_with`](Self::execute_with).
    pub async fn execute(
        &self,
        operation: &str,
        params: Value,
    ) -> crate::error::Result<EffectOutcome> {
        self.execute_with(operation, params, ExecuteOptions::default()).await
    }

    /// Executes an operation.
    ///
    /// `params` must be a JSON object (or null, read as empty). The call runs
    /// the fixed pipeline: operation lookup, input validation, rate-limit
    /// admission, breaker admission, request assembly, dispatch with the
    /// contract's retry policy, breaker recording, response mapping.
    ///
    /// # Errors
    /// Returns [`EffectError`]; [`EffectErrorKind`] is the full taxonomy.
    pub async fn execute_with(
        &self,
        operation: &str,
        params: Value,
        options: ExecuteOptions,
    ) -> crate::error::Result<EffectOutcome> {
        let started = Instant::now();
        let correlation_id = options
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancel = options
            .cancellation
            .clone()
            .unwrap_or_else(|| self.inner.cancel.child_token());

        debug!(
            contract = %self.inner.contract.name,
            operation,
            correlation_id = %correlation_id,
            "executing effect"
        );

        let result = self
            .execute_inner(operation, params, &options, &correlation_id, &cancel)
            .await;
        let duration = started.elapsed();
        self.inner
            .metrics
            .record(operation, result.is_ok(), duration);

        match result {
            Ok((response, attempts)) => {
                let output = self.map_output(operation, &response);
                debug!(
                    contract = %self.inner.contract.name,
                    operation,
                    correlation_id = %correlation_id,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    "effect succeeded"
                );
                Ok(EffectOutcome {
                    operation: operation.to_string(),
                    correlation_id,
                    output,
                    status_code: response.status_code,
                    attempts,
                    duration,
                    metadata: response.metadata,
                })
            }
            Err((kind, attempts)) => {
                let error = EffectError {
                    operation: operation.to_string(),
                    correlation_id,
                    attempts,
                    kind,
                };
                warn!(contract = %self.inner.contract.name, %error, "effect failed");
                Err(error)
            }
        }
    }

    /// Composite health: live handler probe, breaker state, metrics.
    pub async fn health_check(&self) -> HealthReport {
        HealthReport {
            handler_healthy: self.inner.handler.health_check().await,
            circuit_breaker_state: self.inner.breaker.as_ref().map(CircuitBreaker::state),
            metrics: self.inner.metrics.snapshot(),
        }
    }

    /// Current metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Breaker state, when the contract configures one.
    #[must_use]
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.inner.breaker.as_ref().map(CircuitBreaker::state)
    }

    /// Cancels the runtime's lifetime token, then shuts the handler down.
    ///
    /// Calls already inside a handler attempt finish that attempt; anything
    /// reaching a suspension point afterwards observes cancellation, unless
    /// the caller supplied its own token.
    ///
    /// # Errors
    /// Propagates the handler's shutdown failure.
    pub async fn shutdown(&self) -> Result<(), HandlerError> {
        debug!(contract = %self.inner.contract.name, "shutting down effect runtime");
        self.inner.cancel.cancel();
        self.inner.handler.shutdown().await
    }

    async fn execute_inner(
        &self,
        operation: &str,
        params: Value,
        options: &ExecuteOptions,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(ProtocolResponse, u32), (EffectErrorKind, u32)> {
        if cancel.is_cancelled() || self.inner.cancel.is_cancelled() {
            return Err((EffectErrorKind::Cancelled, 0));
        }

        let Some(config) = self.inner.contract.operation(operation) else {
            return Err((EffectErrorKind::UnknownOperation(operation.to_string()), 0));
        };

        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err((
                    ValidationError::NotAnObject {
                        actual: validate::json_type_name(&other),
                    }
                    .into(),
                    0,
                ));
            }
        };
        if let Err(error) = validate::validate_input(&params, &config.validation) {
            return Err((error.into(), 0));
        }

        if let Some(limiter) = &self.inner.limiter {
            let admitted = match self.inner.limiter_budget {
                Some(budget) => limiter.acquire_n_timeout(1, budget, cancel).await,
                None => limiter.acquire(cancel).await,
            };
            match admitted {
                Ok(()) => {}
                Err(AcquireError::TimedOut { budget_ms }) => {
                    return Err((EffectErrorKind::RateLimitTimeout { budget_ms }, 0));
                }
                Err(AcquireError::Cancelled) => {
                    return Err((EffectErrorKind::Cancelled, 0));
                }
                // A single token never exceeds the bucket's capacity (the
                // limiter clamps burst to at least one); surface it like an
                // admission timeout if it ever fires.
                Err(AcquireError::ExceedsBurst { .. }) => {
                    return Err((EffectErrorKind::RateLimitTimeout { budget_ms: 0 }, 0));
                }
            }
        }

        if let Some(breaker) = &self.inner.breaker
            && breaker.is_open()
        {
            debug!(
                contract = %self.inner.contract.name,
                operation,
                "circuit breaker refused the call"
            );
            return Err((EffectErrorKind::CircuitOpen, 0));
        }

        let request = self.build_request(operation, params, options, correlation_id);
        let outcome = self.dispatch(config, &request, cancel).await;

        match outcome {
            Ok((response, attempts)) => {
                if let Some(breaker) = &self.inner.breaker {
                    breaker.record_success();
                }
                Ok((response, attempts))
            }
            Err((kind, attempts)) => {
                // The admitted dispatch settled as a failure; the breaker
                // sees one outcome regardless of how many attempts ran.
                if let Some(breaker) = &self.inner.breaker {
                    breaker.record_failure();
                }
                Err((kind, attempts))
            }
        }
    }

    /// Dispatches one admitted request, through the retry policy when the
    /// contract enables one.
    async fn dispatch(
        &self,
        config: &Operation,
        request: &ProtocolRequest,
        cancel: &CancellationToken,
    ) -> Result<(ProtocolResponse, u32), (EffectErrorKind, u32)> {
        let Some(policy) = &self.inner.retry else {
            return match self.attempt(config, request).await {
                Ok(response) => Ok((response, 1)),
                Err(error) => Err((EffectErrorKind::Handler(error), 1)),
            };
        };

        let attempts_made = AtomicU32::new(0);
        let result = policy
            .execute_with(
                cancel,
                |attempt| {
                    attempts_made.store(attempt + 1, Ordering::Relaxed);
                    self.attempt(config, request)
                },
                |error: &HandlerError| {
                    config
                        .error_handling
                        .is_retryable(error.code(), &error.message)
                },
                |attempt, error: &HandlerError| {
                    warn!(
                        contract = %self.inner.contract.name,
                        operation = %request.operation,
                        correlation_id = %request.correlation_id,
                        attempt,
                        error = %error,
                        "attempt failed, backing off before retry"
                    );
                },
            )
            .await;

        match result {
            Ok(response) => Ok((response, attempts_made.load(Ordering::Relaxed))),
            Err(RetryError::Exhausted { attempts, source }) => {
                Err((EffectErrorKind::RetryExhausted { attempts, source }, attempts))
            }
            Err(RetryError::NotRetryable { attempt, source }) => {
                Err((EffectErrorKind::Handler(source), attempt))
            }
            Err(RetryError::Cancelled { attempts }) => {
                Err((EffectErrorKind::Cancelled, attempts))
            }
        }
    }

    /// One handler invocation, normalized: a response that fails the
    /// operation's success criteria becomes a [`HandlerError`], so transport
    /// failures and unhappy responses feed the same retry classification and
    /// breaker accounting.
    async fn attempt(
        &self,
        config: &Operation,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResponse, HandlerError> {
        let response = self.inner.handler.execute(request, config).await?;
        response_verdict(config, response)
    }

    fn build_request(
        &self,
        operation: &str,
        params: Map<String, Value>,
        options: &ExecuteOptions,
        correlation_id: &str,
    ) -> ProtocolRequest {
        let mut headers = options.headers.clone();
        if let Some(header) = &self.inner.contract.observability.correlation_header {
            headers.insert(header.clone(), correlation_id.to_string());
        }
        ProtocolRequest {
            operation: operation.to_string(),
            params,
            headers,
            timeout_ms: self.inner.contract.connection.timeout_ms,
            correlation_id: correlation_id.to_string(),
        }
    }

    fn map_output(&self, operation: &str, response: &ProtocolResponse) -> Value {
        let data = response.data.as_ref();
        if self.inner.contract.observability.log_payloads
            && let Some(payload) = data
        {
            debug!(operation, payload = %payload, "raw response payload");
        }
        match self.inner.mappings.get(operation) {
            Some(mapping) => Value::Object(mapping.apply(data.unwrap_or(&Value::Null))),
            None => data.cloned().unwrap_or(Value::Null),
        }
    }
}

/// Applies the operation's success criteria to a handler response.
///
/// The handler's `success` flag must hold, and when the operation declares
/// success codes a present status must be among them. A failing response
/// converts to a [`HandlerError`] whose code is the status, so contract
/// `error_handling` lists written against statuses classify it directly.
fn response_verdict(
    config: &Operation,
    response: ProtocolResponse,
) -> Result<ProtocolResponse, HandlerError> {
    let status_rejected = response.status_code.is_some_and(|status| {
        !config.response.success_codes.is_empty()
            && !config.response.success_codes.contains(&status)
    });
    if response.success && !status_rejected {
        return Ok(response);
    }

    let code = response.status_code.map(|status| status.to_string());
    let message = match (response.error, response.status_code) {
        (Some(error), _) => error,
        (None, Some(status)) if status_rejected => {
            format!("status {status} outside declared success codes")
        }
        (None, Some(status)) => format!("handler reported failure (status {status})"),
        (None, None) => "handler reported failure".to_string(),
    };
    Err(HandlerError { code, message })
}

fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.max_attempts,
        initial_delay: Duration::from_millis(config.initial_delay_ms),
        max_delay: Duration::from_millis(config.max_delay_ms),
        backoff_multiplier: config.backoff_multiplier,
        jitter: config.jitter.then(JitterBounds::default),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn operation(spec: Value) -> Operation {
        serde_json::from_value(spec).unwrap()
    }

    #[test]
    fn verdict_accepts_successful_responses() {
        let config = operation(json!({}));
        let response = ProtocolResponse::ok(json!({"x": 1})).with_status(200);
        assert!(response_verdict(&config, response).is_ok());
    }

    #[test]
    fn verdict_rejects_handler_reported_failure() {
        let config = operation(json!({}));
        let error = response_verdict(&config, ProtocolResponse::failed("nope")).unwrap_err();
        assert_eq!(error.message, "nope");
        assert_eq!(error.code(), None);
    }

    #[test]
    fn declared_success_codes_tighten_the_verdict() {
        let config = operation(json!({"response": {"success_codes": [200, 201]}}));
        let ok = ProtocolResponse::ok(json!({})).with_status(201);
        assert!(response_verdict(&config, ok).is_ok());

        let rejected = ProtocolResponse::ok(json!({})).with_status(503);
        let error = response_verdict(&config, rejected).unwrap_err();
        assert_eq!(error.code(), Some("503"));
        assert!(error.message.contains("outside declared success codes"));
    }

    #[test]
    fn empty_success_codes_defer_to_the_flag() {
        let config = operation(json!({}));
        let response = ProtocolResponse::ok(json!({})).with_status(500);
        assert!(response_verdict(&config, response).is_ok());
    }

    #[test]
    fn statusless_responses_pass_on_the_flag_alone() {
        let config = operation(json!({"response": {"success_codes": [200]}}));
        let response = ProtocolResponse::ok(json!({}));
        assert!(response_verdict(&config, response).is_ok());
    }

    #[test]
    fn retry_policy_conversion_honors_the_jitter_switch() {
        let with_jitter: RetryConfig = serde_json::from_value(json!({
            "max_attempts": 5, "initial_delay_ms": 50, "jitter": true
        }))
        .unwrap();
        let policy = retry_policy(&with_jitter);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert!(policy.jitter.is_some());

        let without: RetryConfig =
            serde_json::from_value(json!({"jitter": false})).unwrap();
        assert!(retry_policy(&without).jitter.is_none());
    }
}
