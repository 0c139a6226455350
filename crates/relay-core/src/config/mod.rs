//! Configuration module for Relay
//!
//! Handles loading and parsing of `.relay.toml` configuration files
//! with support for environment variable expansion.

mod loader;
mod types;

pub use loader::{load_config, load_from_file, sample_config, user_config_path, ConfigError};
pub use types::{
    default_agents, AgentConfig, RelayConfig, ServerConfig, TransportConfig, TransportMode,
};
