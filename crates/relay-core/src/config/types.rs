//! Configuration types for Relay
//!
//! Defines the structure of `.relay.toml` configuration.

use crate::protocol::AgentRole;
use crate::transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Orchestrator server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Transport settings shared by every agent call
    #[serde(default)]
    pub transport: TransportConfig,

    /// Agent name to address
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, AgentConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            transport: TransportConfig::default(),
            agents: default_agents(),
        }
    }
}

/// Server section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which transport implementation carries envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Agents are separate services reached over HTTP
    #[default]
    Http,
    /// Agents are registered in-process
    Local,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(TransportMode::Http),
            "local" => Ok(TransportMode::Local),
            _ => Err(format!("Unknown transport mode: {}", s)),
        }
    }
}

/// Transport section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub mode: TransportMode,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Health check timeout in seconds
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// Attempts per call, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay in milliseconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Randomize backoff delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_health_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            timeout_secs: default_timeout(),
            health_timeout_secs: default_health_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            jitter: true,
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Retry policy described by this section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            jitter: self.jitter,
            ..RetryPolicy::default()
        }
    }
}

/// A single agent entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base address, e.g. `http://localhost:8001`
    pub url: String,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Default agent addresses
pub fn default_agents() -> BTreeMap<String, AgentConfig> {
    let mut agents = BTreeMap::new();
    for (role, port) in AgentRole::workers().into_iter().zip([8001, 8002, 8003]) {
        agents.insert(
            role.as_str().to_string(),
            AgentConfig::new(format!("http://localhost:{}", port)),
        );
    }
    agents
}

impl RelayConfig {
    /// Get an agent entry by name
    pub fn get_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), String> {
        if self.transport.max_retries == 0 {
            return Err("transport.max_retries must be at least 1".to_string());
        }
        if self.transport.timeout_secs == 0 || self.transport.health_timeout_secs == 0 {
            return Err("transport timeouts must be non-zero".to_string());
        }
        if let Some((name, _)) = self.agents.iter().find(|(_, a)| a.url.trim().is_empty()) {
            return Err(format!("agent '{}' has an empty url", name));
        }
        Ok(())
    }
}
