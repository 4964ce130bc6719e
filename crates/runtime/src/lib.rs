//! Contract-driven effect execution.
//!
//! An [`EffectRuntime`] executes one contract's named operations against an
//! injected, I/O-performing [`ProtocolHandler`], wrapping every call in the
//! contract's declared resilience policy:
//!
//! ```text
//! lookup -> validate -> rate limit -> circuit breaker -> retry(handler) -> map
//! ```
//!
//! Handlers are registered per protocol in a [`HandlerRegistry`]; the runtime
//! itself never opens a socket. Contract parsing and validation live in
//! `ballast-contract`, the resilience primitives composed here live in
//! `ballast-resilience`.

pub mod error;
pub mod handler;
pub mod mapping;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod runtime;

pub use error::{EffectError, EffectErrorKind, RegistryError, Result};
pub use handler::{HandlerError, ProtocolHandler};
pub use mapping::ResponseMapping;
pub use metrics::{MetricsSnapshot, OperationMetrics};
pub use protocol::{ProtocolRequest, ProtocolResponse};
pub use registry::{HandlerFactory, HandlerRegistry};
pub use runtime::{EffectOutcome, EffectRuntime, ExecuteOptions, HealthReport};
