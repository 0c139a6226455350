//! Agent registry
//!
//! Maps logical agent names to base addresses and aggregates health checks.

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::transport::Transport;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Registry of agent addresses
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<String, String>>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every agent in the configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        let registry = Self::new();
        for (name, agent) in &config.agents {
            registry.register(name.clone(), agent.url.clone());
        }
        registry
    }

    /// Register an agent, replacing any previous address
    pub fn register(&self, name: impl Into<String>, address: impl Into<String>) {
        let name = name.into();
        let address = address.into();
        tracing::info!("Registered agent {} at {}", name, address);
        self.agents.write().insert(name, address);
    }

    /// Look up an agent's address
    pub fn resolve(&self, name: &str) -> Result<String> {
        self.agents
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::unknown_agent(name))
    }

    /// Snapshot of every registration
    pub fn list_all(&self) -> BTreeMap<String, String> {
        self.agents.read().clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Check every registered agent concurrently.
    ///
    /// Each entry resolves on its own; one unreachable agent never hides the others.
    pub async fn health_all(&self, transport: &dyn Transport) -> BTreeMap<String, bool> {
        let agents = self.list_all();
        let checks = agents.iter().map(|(name, address)| async move {
            (name.clone(), transport.check_health(address).await)
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }
}
