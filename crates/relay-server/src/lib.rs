//! Relay Server Library
//!
//! Serves the orchestrator: a WebSocket session gateway at `/ws` plus status
//! and health endpoints.

pub mod gateway;
pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use relay_core::RelayConfig;
use std::net::SocketAddr;
use std::sync::Once;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use state::AppState;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing subscriber (only once)
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| {
                    "relay_server=debug,relay_core=info,tower_http=debug".into()
                }),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::status))
        .route("/health", get(routes::health))
        .route("/ws", get(routes::websocket_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Log every agent's health once; unhealthy agents never block startup
pub async fn log_agent_health(state: &AppState) {
    tracing::info!("Checking agent health...");
    let health = state.registry.health_all(state.transport.as_ref()).await;
    for (agent, healthy) in health {
        if healthy {
            tracing::info!("{} agent is healthy", agent);
        } else {
            tracing::warn!("{} agent is not responding", agent);
        }
    }
}

/// Serve `state` on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    log_agent_health(&state).await;

    let app = build_router(state);
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the orchestrator server with `config`
pub async fn run_server(config: RelayConfig) -> anyhow::Result<()> {
    // Initialize tracing (if not already done)
    init_tracing();

    tracing::info!("Starting Relay orchestrator...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Transport mode: {:?}", config.transport.mode);
    let state = AppState::new(config)?;

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}
