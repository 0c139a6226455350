//! Server state management

use relay_core::{
    AgentRegistry, HttpTransport, LocalTransport, Orchestrator, RelayConfig, SessionStore,
    SharedTransport, TransportMode,
};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub registry: Arc<AgentRegistry>,
    pub transport: SharedTransport,
    /// Set in local mode so in-process agents can be registered
    pub local: Option<Arc<LocalTransport>>,
    pub orchestrator: Orchestrator,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Build state with the transport selected by `config.transport.mode`
    pub fn new(config: RelayConfig) -> relay_core::Result<Self> {
        match config.transport.mode {
            TransportMode::Http => {
                let transport = Arc::new(HttpTransport::new(&config.transport)?);
                let registry = Arc::new(AgentRegistry::from_config(&config));
                Ok(Self::assemble(config, registry, transport, None))
            }
            TransportMode::Local => Ok(Self::local(config).0),
        }
    }

    /// In-process state: every configured agent is addressed as `local://<name>`.
    ///
    /// Agents answer only once a handler is registered on the returned transport.
    pub fn local(config: RelayConfig) -> (Self, Arc<LocalTransport>) {
        let local = Arc::new(LocalTransport::new());
        let registry = Arc::new(AgentRegistry::new());
        for name in config.agents.keys() {
            registry.register(name.clone(), LocalTransport::address(name));
        }
        let state = Self::assemble(config, registry, local.clone(), Some(local.clone()));
        (state, local)
    }

    fn assemble(
        config: RelayConfig,
        registry: Arc<AgentRegistry>,
        transport: SharedTransport,
        local: Option<Arc<LocalTransport>>,
    ) -> Self {
        let orchestrator = Orchestrator::new(transport.clone(), registry.clone());
        Self {
            config: Arc::new(config),
            registry,
            transport,
            local,
            orchestrator,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
