//! Envelope transport
//!
//! One [`Transport`] abstraction with two implementations:
//! - [`HttpTransport`]: POSTs envelopes to `{address}/message` with retry/backoff
//! - [`LocalTransport`]: dispatches directly to in-process [`AgentHandler`]s
//!
//! Both are selected by `transport.mode` in the configuration.

mod http;
mod local;
mod retry;

pub use http::HttpTransport;
pub use local::{handler_fn, AgentHandler, LocalTransport, LOCAL_SCHEME};
pub use retry::{retry_with_backoff, AttemptError, RetryPolicy};

use crate::protocol::Envelope;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Delivers envelopes to agents and probes their health
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an envelope to the agent at `target` and return its response body
    async fn send(&self, envelope: &Envelope, target: &str) -> Result<Value>;

    /// Probe an agent; never fails, any problem reads as unhealthy
    async fn check_health(&self, address: &str) -> bool;
}

/// Shared transport handle
pub type SharedTransport = Arc<dyn Transport>;
