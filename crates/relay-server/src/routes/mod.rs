//! Route handlers

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
    Json,
};

use crate::gateway;
use crate::state::AppState;

// ========== Status Routes ==========

/// Orchestrator banner with the configured agent addresses
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Relay - Main Orchestrator",
        "status": "running",
        "version": relay_core::version(),
        "agents": state.registry.list_all()
    }))
}

/// Probe every registered agent
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let agents = state.registry.health_all(state.transport.as_ref()).await;

    Json(serde_json::json!({
        "status": "healthy",
        "orchestrator": "running",
        "agents": agents
    }))
}

// ========== WebSocket ==========

/// Upgrade to a session gateway connection
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway::handle_socket(socket, state))
}
