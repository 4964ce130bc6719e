//! Handler registry.
//!
//! Protocol handlers are injected, never instantiated by the runtime:
//! embedders register one factory per protocol discriminator, then open
//! contracts through the registry. Opening builds the handler, runs its
//! initialization against the contract, and assembles an [`EffectRuntime`]
//! around both.

use std::collections::HashMap;
use std::sync::Arc;

use ballast_contract::model::Contract;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::RegistryError;
use crate::handler::ProtocolHandler;
use crate::runtime::EffectRuntime;

/// Builds a handler for one contract.
pub type HandlerFactory = Arc<dyn Fn(&Contract) -> Arc<dyn ProtocolHandler> + Send + Sync>;

/// Registry of handler factories keyed by protocol discriminator.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: RwLock<HashMap<String, HandlerFactory>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under a protocol discriminator, replacing any
    /// previous registration for it.
    pub fn register<F>(&self, protocol: impl Into<String>, factory: F)
    where
        F: Fn(&Contract) -> Arc<dyn ProtocolHandler> + Send + Sync + 'static,
    {
        let protocol = protocol.into();
        let replaced = self
            .factories
            .write()
            .insert(protocol.clone(), Arc::new(factory))
            .is_some();
        debug!(protocol = %protocol, replaced, "registered protocol handler factory");
    }

    #[must_use]
    pub fn contains(&self, protocol: &str) -> bool {
        self.factories.read().contains_key(protocol)
    }

    /// Registered discriminators, sorted, for diagnostics.
    #[must_use]
    pub fn protocols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Opens a contract: builds the protocol's handler, initializes it, and
    /// assembles a runtime.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownProtocol`] when no factory matches the
    /// contract's protocol; [`RegistryError::Initialize`] when the handler
    /// rejects the contract.
    pub async fn open(&self, contract: Contract) -> Result<EffectRuntime, RegistryError> {
        let key = contract.protocol.kind.as_str().to_string();
        // Clone the factory out so the lock is released before any await.
        let factory = self
            .factories
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownProtocol(key))?;
        let handler = factory(&contract);
        handler.initialize(&contract).await?;
        debug!(contract = %contract.name, protocol = %contract.protocol.kind, "opened contract");
        Ok(EffectRuntime::new(contract, handler))
    }
}
