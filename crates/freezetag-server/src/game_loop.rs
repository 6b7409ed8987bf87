use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use freezetag_arena::{LineOfSight, TeamAssigner};
use freezetag_core::config::GameConfig;
use freezetag_core::match_state::MatchState;
use freezetag_core::net::messages::ServerMessage;
use freezetag_core::net::protocol::encode_server_message;
use freezetag_core::player::PlayerId;
use freezetag_core::services::memory::InMemoryServices;

use crate::lifecycle::GameStateLifecycle;
use crate::timers::{TimerFired, TokioScheduler};

/// Commands sent from the WebSocket handlers to the match actor.
#[derive(Debug)]
pub enum MatchCommand {
    PlayerJoined { player_id: PlayerId },
    PlayerLeft { player_id: PlayerId },
    Rescue { rescuer: PlayerId, target: PlayerId },
    Stop,
}

/// Handles to a running match actor.
pub struct MatchHandle {
    pub commands: mpsc::UnboundedSender<MatchCommand>,
    pub state: watch::Receiver<MatchState>,
    pub task: JoinHandle<()>,
}

/// Everything needed to start the match actor.
pub struct MatchSetup {
    pub config: GameConfig,
    pub services: InMemoryServices,
    pub sight: Arc<dyn LineOfSight>,
    pub seed: Option<u64>,
}

/// Spawn the match actor as a tokio task.
///
/// Every event the lifecycle emits is encoded once and published on
/// `broadcast_tx` for the connected clients.
pub fn spawn_match(setup: MatchSetup, broadcast_tx: broadcast::Sender<Bytes>) -> MatchHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(MatchState::Lobby);

    let task = tokio::spawn(run_match(setup, cmd_rx, broadcast_tx, state_tx));

    MatchHandle {
        commands: cmd_tx,
        state: state_rx,
        task,
    }
}

async fn run_match(
    setup: MatchSetup,
    mut cmd_rx: mpsc::UnboundedReceiver<MatchCommand>,
    broadcast_tx: broadcast::Sender<Bytes>,
    state_tx: watch::Sender<MatchState>,
) {
    let MatchSetup {
        config,
        services,
        sight,
        seed,
    } = setup;

    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<TimerFired>();
    let lc = &config.lifecycle;
    let teams = match seed {
        Some(seed) => TeamAssigner::with_seed(lc.seeker_count, lc.min_players, seed),
        None => TeamAssigner::new(lc.seeker_count, lc.min_players),
    };

    let mut lifecycle = GameStateLifecycle::new(
        config.clone(),
        services.services(),
        sight,
        teams,
        TokioScheduler::new(timer_tx),
    );

    lifecycle.events_mut().subscribe_all(move |event| {
        let msg = ServerMessage::from(event);
        match encode_server_message(&msg) {
            Ok(data) => {
                // No receivers just means nobody is connected.
                let _ = broadcast_tx.send(Bytes::from(data));
            },
            Err(e) => tracing::error!(kind = ?event.kind(), error = %e, "Failed to encode event"),
        }
    });
    lifecycle.events_mut().on_state_changed(move |new, _old| {
        state_tx.send_replace(new);
    });

    lifecycle.start();

    loop {
        tokio::select! {
            Some(fired) = timer_rx.recv() => {
                lifecycle.on_timer(fired, Instant::now());
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(MatchCommand::PlayerJoined { player_id }) => {
                        lifecycle.player_joined(player_id);
                    },
                    Some(MatchCommand::PlayerLeft { player_id }) => {
                        lifecycle.player_left(player_id, Instant::now());
                        services.forget(player_id);
                    },
                    Some(MatchCommand::Rescue { rescuer, target }) => {
                        lifecycle.rescue(rescuer, target, Instant::now());
                    },
                    Some(MatchCommand::Stop) | None => break,
                }
            }
        }
    }

    lifecycle.shutdown();
    tracing::info!(rounds = lifecycle.rounds_played(), "Match actor stopped");
}
