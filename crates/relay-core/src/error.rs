//! Error types for Relay Core
//!
//! Provides a unified error type for envelope, transport and pipeline operations.

use thiserror::Error;

/// Result type for Relay Core operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for Relay Core
#[derive(Error, Debug)]
pub enum RelayError {
    /// Envelope failed validation (unknown kind, missing content keys, bad parameters)
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Every retry attempt failed with a transient error
    #[error("Transport exhausted after {attempts} attempts: {last_error}")]
    TransportExhausted { attempts: u32, last_error: String },

    /// The agent rejected the request with a 4xx status
    #[error("Transport rejected ({status}): {message}")]
    TransportRejected { status: u16, message: String },

    /// Agent name is not registered
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Request action is not one the agent understands
    #[error("Unknown action '{action}' for agent {agent}")]
    UnknownAction { agent: String, action: String },

    /// Agent answered 2xx but reported an error in its body
    #[error("Agent {agent} failed: {message}")]
    AgentFailure { agent: String, message: String },

    /// Agent result is missing keys the pipeline needs
    #[error("Malformed response from {agent}: {reason}")]
    MalformedResponse { agent: String, reason: String },

    /// The owning connection went away
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a malformed envelope error
    pub fn malformed(msg: impl Into<String>) -> Self {
        RelayError::MalformedEnvelope(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Config(msg.into())
    }

    /// Create an unknown agent error
    pub fn unknown_agent(name: impl Into<String>) -> Self {
        RelayError::UnknownAgent(name.into())
    }

    /// Create an agent failure error
    pub fn agent_failure(agent: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::AgentFailure {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed_response(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        RelayError::MalformedResponse {
            agent: agent.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the owning connection being cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let err = RelayError::TransportExhausted {
            attempts: 3,
            last_error: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_json_error_converts() {
        let err: RelayError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Serialization(_)));
    }
}
