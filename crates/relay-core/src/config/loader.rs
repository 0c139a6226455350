//! Configuration loader with environment variable expansion
//!
//! Loads configuration from `.relay.toml` in the working directory or the user config directory.

use super::types::{AgentConfig, RelayConfig};
use crate::protocol::AgentRole;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::RelayError {
    fn from(err: ConfigError) -> Self {
        crate::RelayError::Config(err.to_string())
    }
}

/// Load configuration from various sources
///
/// Priority order:
/// 1. Project-level `.relay.toml`
/// 2. User-level `~/.config/relay/config.toml`
/// 3. Default configuration
///
/// Environment overrides apply on top of whichever source was used.
pub fn load_config(project_dir: &Path) -> Result<RelayConfig, ConfigError> {
    let project_config = project_dir.join(".relay.toml");
    if project_config.exists() {
        return load_from_file(&project_config);
    }

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            return load_from_file(&user_config);
        }
    }

    finish(RelayConfig::default())
}

/// User config file path
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("relay").join("config.toml"))
}

/// Load configuration from a specific file
pub fn load_from_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: RelayConfig = toml::from_str(&content)?;

    expand_env_vars(&mut config);

    finish(config)
}

fn finish(config: RelayConfig) -> Result<RelayConfig, ConfigError> {
    let config = apply_overrides(config, |key| std::env::var(key).ok());
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn env_regex() -> &'static Regex {
    static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
    ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

/// Expand ${VAR} patterns in agent URLs
fn expand_env_vars(config: &mut RelayConfig) {
    for agent in config.agents.values_mut() {
        agent.url = expand_string(&agent.url, env_regex());
    }
}

/// Expand environment variables in a single string
fn expand_string(s: &str, regex: &Regex) -> String {
    regex
        .replace_all(s, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
}

/// Apply overrides for common settings
///
/// Supports:
/// - RELAY_ANALYST_URL / RELAY_DEVELOPER_URL / RELAY_TESTER_URL -> agents.<Name>.url
/// - RELAY_PORT -> server.port
/// - RELAY_TRANSPORT -> transport.mode
fn apply_overrides<F>(mut config: RelayConfig, lookup: F) -> RelayConfig
where
    F: Fn(&str) -> Option<String>,
{
    for role in AgentRole::workers() {
        let key = format!("RELAY_{}_URL", role.as_str().to_uppercase());
        if let Some(url) = lookup(&key).filter(|v| !v.is_empty()) {
            config
                .agents
                .insert(role.as_str().to_string(), AgentConfig::new(url));
        }
    }

    if let Some(port) = lookup("RELAY_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }

    if let Some(mode) = lookup("RELAY_TRANSPORT").and_then(|m| m.parse().ok()) {
        config.transport.mode = mode;
    }

    config
}

/// Create a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Relay Configuration
# Place this file in your working directory as .relay.toml
# or in ~/.config/relay/config.toml for global settings

[server]
host = "0.0.0.0"
port = 8000

[transport]
# "http" for networked agents, "local" for in-process handlers
mode = "http"
timeout_secs = 30
health_timeout_secs = 5
# Attempts per agent call, including the first
max_retries = 3
backoff_base_ms = 1000

[agents.Analyst]
url = "http://localhost:8001"

[agents.Developer]
url = "http://localhost:8002"

[agents.Tester]
url = "http://localhost:8003"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportMode;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.transport.max_retries, 3);
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.transport.health_timeout_secs, 5);
        assert_eq!(
            config.get_agent("Developer").map(|a| a.url.as_str()),
            Some("http://localhost:8002")
        );
    }

    #[test]
    fn test_sample_config_parses() {
        let config: RelayConfig = toml::from_str(sample_config()).unwrap();
        assert_eq!(config.agents.len(), 3);
        assert_eq!(config.transport.mode, TransportMode::Http);
        assert_eq!(
            config.get_agent("Tester").map(|a| a.url.as_str()),
            Some("http://localhost:8003")
        );
    }

    #[test]
    fn test_load_project_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".relay.toml"),
            r#"
[transport]
max_retries = 5
mode = "local"

[agents.Analyst]
url = "local://Analyst"
"#,
        )
        .unwrap();

        let config = load_from_file(&dir.path().join(".relay.toml")).unwrap();
        assert_eq!(config.transport.max_retries, 5);
        assert_eq!(config.transport.backoff_base_ms, 1000);
        assert_eq!(config.agents.len(), 1);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[transport]\nmax_retries = 0\n").unwrap();
        assert!(matches!(load_from_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(load_from_file(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_expand_env_var() {
        std::env::set_var("RELAY_TEST_EXPAND_HOST", "http://agents.internal");
        let result = expand_string("${RELAY_TEST_EXPAND_HOST}:8003", env_regex());
        assert_eq!(result, "http://agents.internal:8003");
        std::env::remove_var("RELAY_TEST_EXPAND_HOST");
    }

    #[test]
    fn test_missing_env_var() {
        let result = expand_string("${RELAY_NONEXISTENT_VAR}", env_regex());
        assert_eq!(result, "${RELAY_NONEXISTENT_VAR}");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RELAY_TESTER_URL", "http://tester:9000"),
            ("RELAY_PORT", "9100"),
            ("RELAY_TRANSPORT", "local"),
            ("RELAY_ANALYST_URL", ""),
        ]
        .into_iter()
        .collect();

        let config = apply_overrides(RelayConfig::default(), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.transport.mode, TransportMode::Local);
        assert_eq!(config.agents["Tester"].url, "http://tester:9000");
        assert_eq!(config.agents["Analyst"].url, "http://localhost:8001");
    }
}
