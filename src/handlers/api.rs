use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::core::session::SessionSnapshot;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /` liveness probe.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionsResponse {
    pub active_connections: usize,
    pub sessions: Vec<SessionSnapshot>,
}

/// `GET /sessions` lists relay sessions currently in the registry.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        active_connections: state.active_relay_connections(),
        sessions: state.sessions.snapshot(),
    })
}
