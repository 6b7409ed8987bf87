pub mod config;
pub mod game_loop;
pub mod health;
pub mod lifecycle;
pub mod round;
pub mod state;
pub mod timers;
pub mod ws;

use axum::Router;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
///
/// Spawns the match actor, so it must run inside a tokio runtime.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .with_state(state.clone());

    (app, state)
}
