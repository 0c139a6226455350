//! In-process transport
//!
//! Routes envelopes straight to registered [`AgentHandler`]s, for tests and
//! single-process deployments. Delivered envelopes are kept in a bounded
//! history that can be filtered by conversation.

use super::Transport;
use crate::error::{RelayError, Result};
use crate::protocol::Envelope;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

/// Address scheme for in-process agents (`local://Analyst`)
pub const LOCAL_SCHEME: &str = "local://";

/// Envelopes kept before the oldest are evicted
pub const DEFAULT_HISTORY_CAP: usize = 1024;

/// An in-process agent
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Handle one request envelope and return the response body
    async fn handle(&self, envelope: Envelope) -> Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> AgentHandler for FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, envelope: Envelope) -> Result<Value> {
        (self.0)(envelope).await
    }
}

/// Wrap an async closure as an [`AgentHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn AgentHandler>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Direct-dispatch transport
pub struct LocalTransport {
    handlers: RwLock<HashMap<String, Arc<dyn AgentHandler>>>,
    history: Mutex<VecDeque<Envelope>>,
    history_cap: usize,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::with_history_cap(DEFAULT_HISTORY_CAP)
    }
}

impl LocalTransport {
    /// Create a transport with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport keeping at most `cap` envelopes
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_cap: cap,
        }
    }

    /// Conventional address for an in-process agent
    pub fn address(agent_name: &str) -> String {
        format!("{}{}", LOCAL_SCHEME, agent_name)
    }

    /// Register (or replace) the handler serving `address`
    pub fn register(&self, address: impl Into<String>, handler: Arc<dyn AgentHandler>) {
        self.handlers.write().insert(address.into(), handler);
    }

    /// Remove the handler serving `address`
    pub fn unregister(&self, address: &str) -> bool {
        self.handlers.write().remove(address).is_some()
    }

    /// Delivered envelopes, optionally only those of one conversation
    pub fn history(&self, conversation_id: Option<&str>) -> Vec<Envelope> {
        let history = self.history.lock();
        match conversation_id {
            Some(id) => history
                .iter()
                .filter(|e| e.conversation_id() == Some(id))
                .cloned()
                .collect(),
            None => history.iter().cloned().collect(),
        }
    }

    /// Forget all delivered envelopes
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Drop the envelopes of one conversation, returning how many went
    pub fn forget_conversation(&self, conversation_id: &str) -> usize {
        let mut history = self.history.lock();
        let before = history.len();
        history.retain(|e| e.conversation_id() != Some(conversation_id));
        before - history.len()
    }

    fn record(&self, envelope: &Envelope) {
        if self.history_cap == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_cap {
            history.pop_front();
        }
        history.push_back(envelope.clone());
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, envelope: &Envelope, target: &str) -> Result<Value> {
        let handler = self.handlers.read().get(target).cloned();
        let handler = handler.ok_or_else(|| RelayError::TransportExhausted {
            attempts: 1,
            last_error: format!("no in-process agent at {}", target),
        })?;

        tracing::debug!(
            kind = %envelope.kind(),
            from = %envelope.from_agent,
            to = %envelope.to_agent,
            "Dispatching envelope to {}",
            target
        );
        self.record(envelope);
        handler.handle(envelope.clone()).await
    }

    async fn check_health(&self, address: &str) -> bool {
        self.handlers.read().contains_key(address)
    }
}
