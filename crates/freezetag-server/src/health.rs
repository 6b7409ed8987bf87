use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use freezetag_core::match_state::MatchState;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub state: MatchState,
    pub connections: usize,
    pub players: usize,
}

/// Structured health check endpoint. Returns server status, the match
/// state, and connection counts as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        state: state.current_state(),
        connections: state.ws_connection_count.load(Ordering::Relaxed),
        players: state.player_count(),
    })
}
