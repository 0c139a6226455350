//! Relay Core - orchestration library for Relay
//!
//! This crate provides everything the orchestrator needs apart from its
//! client-facing server:
//! - Envelope protocol and typed agent actions
//! - Transports (HTTP with retry/backoff, in-process dispatch)
//! - Agent registry and health aggregation
//! - Session contexts
//! - The turn pipeline (analyze, generate or modify, test, fix once, report)
//! - Configuration loading
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ClientFrame   ┌──────────────┐   Envelope    ┌───────────┐
//! │   Gateway    │ ←───────────── │ Orchestrator │ ────────────→ │  Agents   │
//! │ (any server) │ ─────────────→ │   pipeline   │ ←──────────── │ A / D / T │
//! └──────────────┘   utterance    └──────────────┘   results     └───────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use relay_core::{AgentRegistry, HttpTransport, Orchestrator, RelayConfig, SessionContext};
//!
//! let config = RelayConfig::default();
//! let registry = Arc::new(AgentRegistry::from_config(&config));
//! let transport = Arc::new(HttpTransport::new(&config.transport)?);
//! let orchestrator = Orchestrator::new(transport, registry);
//!
//! let mut ctx = SessionContext::new();
//! let report = orchestrator.run_turn(&mut ctx, "Build a todo app", &tx, &cancel).await;
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use error::{RelayError, Result};
pub use protocol::{
    AgentAction, AgentRole, AnalysisResult, AnalystAction, CodeResult, DeveloperAction,
    Envelope, EnvelopeKind, FileSet, TestReport, TestStatus, TesterAction,
};

// Re-export config types
pub use config::{load_config, RelayConfig, TransportMode};

// Re-export runtime types
pub use pipeline::{ClientFrame, ClientMessage, FrameRole, Orchestrator, Stage, TurnKind, TurnReport};
pub use registry::AgentRegistry;
pub use session::{SessionContext, SessionId, SessionStore, SharedSession};
pub use transport::{
    AgentHandler, HttpTransport, LocalTransport, RetryPolicy, SharedTransport, Transport,
};

/// Get the crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
