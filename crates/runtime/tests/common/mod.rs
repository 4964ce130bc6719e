//! Shared scaffolding: a scripted protocol handler plus contract builders.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ballast_contract::model::{Contract, Operation};
use ballast_runtime::{
    EffectRuntime, HandlerError, ProtocolHandler, ProtocolRequest, ProtocolResponse,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Replays a scripted sequence of outcomes, then settles on a fallback,
/// recording every request it sees.
pub struct ScriptedHandler {
    script: Mutex<VecDeque<Result<ProtocolResponse, HandlerError>>>,
    fallback: Result<ProtocolResponse, HandlerError>,
    requests: Mutex<Vec<ProtocolRequest>>,
    pub healthy: AtomicBool,
    pub initialized: AtomicBool,
    pub shut_down: AtomicBool,
}

impl ScriptedHandler {
    /// Handler that always succeeds with `data` and status 200.
    pub fn ok(data: Value) -> Arc<Self> {
        Self::scripted(
            Vec::new(),
            Ok(ProtocolResponse::ok(data).with_status(200)),
        )
    }

    /// Handler that always fails with a codeless error.
    #[allow(dead_code)]
    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(Vec::new(), Err(HandlerError::new(message)))
    }

    /// Handler that replays `script` in order, then answers with `fallback`.
    pub fn scripted(
        script: Vec<Result<ProtocolResponse, HandlerError>>,
        fallback: Result<ProtocolResponse, HandlerError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    #[allow(dead_code)]
    pub fn request(&self, index: usize) -> ProtocolRequest {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl ProtocolHandler for ScriptedHandler {
    async fn initialize(&self, _contract: &Contract) -> Result<(), HandlerError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(
        &self,
        request: &ProtocolRequest,
        _operation: &Operation,
    ) -> Result<ProtocolResponse, HandlerError> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Parses a contract from operations and resilience JSON sections.
pub fn contract(operations: Value, resilience: Value) -> Contract {
    Contract::from_json_value(ballast_test_support::contract_doc(
        "orders", operations, resilience,
    ))
    .expect("fixture contract parses")
}

/// Runtime over a pass-through `echo` operation with the given resilience.
pub fn echo_runtime(handler: Arc<ScriptedHandler>, resilience: Value) -> EffectRuntime {
    EffectRuntime::new(contract(json!({"echo": {}}), resilience), handler)
}
