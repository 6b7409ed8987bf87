use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};

use freezetag_arena::{LineOfSight, load_arena};
use freezetag_core::match_state::MatchState;
use freezetag_core::player::PlayerId;
use freezetag_core::services::Roster;
use freezetag_core::services::memory::InMemoryServices;

use crate::config::ServerConfig;
use crate::game_loop::{MatchCommand, MatchSetup, spawn_match};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub services: InMemoryServices,
    pub commands: mpsc::UnboundedSender<MatchCommand>,
    pub match_state: watch::Receiver<MatchState>,
    pub broadcast_tx: broadcast::Sender<Bytes>,
    pub ws_connection_count: Arc<AtomicUsize>,
    next_player_id: Arc<AtomicU64>,
}

impl AppState {
    /// Load the arena, wire the in-memory services to it, and spawn the
    /// match actor. Must be called inside a tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let arena = load_arena(config.arena);
        tracing::info!(
            arena = ?config.arena,
            walls = arena.walls.len(),
            spawns = arena.spawn_points.len(),
            "Arena loaded"
        );
        let services = InMemoryServices::with_layout(arena.spawn_layout());
        let sight: Arc<dyn LineOfSight> = Arc::new(arena);

        let (broadcast_tx, _) = broadcast::channel(config.limits.broadcast_capacity);
        let handle = spawn_match(
            MatchSetup {
                config: config.game_config(),
                services: services.clone(),
                sight,
                seed: config.seed,
            },
            broadcast_tx.clone(),
        );

        Self {
            config: Arc::new(config),
            services,
            commands: handle.commands,
            match_state: handle.state,
            broadcast_tx,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            next_player_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn allocate_player_id(&self) -> PlayerId {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current_state(&self) -> MatchState {
        *self.match_state.borrow()
    }

    /// Players queued or in the running round.
    pub fn player_count(&self) -> usize {
        self.services.roster.queued_count() + self.services.roster.in_game_players().len()
    }

    /// Forward a command to the match actor. Returns false once it has stopped.
    pub fn send_command(&self, cmd: MatchCommand) -> bool {
        if self.commands.send(cmd).is_err() {
            tracing::warn!("Match actor is gone, command dropped");
            return false;
        }
        true
    }
}

/// Holds one slot of a shared connection counter for its lifetime.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
