use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use freezetag_core::net::messages::{ClientMessage, JoinMsg, MessageType, ServerMessage, WelcomeMsg};
use freezetag_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
    encode_server_message,
};
use freezetag_core::player::PlayerId;

use crate::game_loop::MatchCommand;
use crate::state::{AppState, ConnectionGuard};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

/// Why a Join was refused.
#[derive(Debug, PartialEq)]
enum JoinRejection {
    InvalidName,
    ProtocolMismatch(u8),
}

impl std::fmt::Display for JoinRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinRejection::InvalidName => write!(f, "invalid player name"),
            JoinRejection::ProtocolMismatch(v) => {
                write!(f, "protocol version mismatch: client={v}, server={PROTOCOL_VERSION}")
            },
        }
    }
}

fn validate_join(join: &JoinMsg) -> Result<String, JoinRejection> {
    if join.protocol_version != 0 && join.protocol_version != PROTOCOL_VERSION {
        return Err(JoinRejection::ProtocolMismatch(join.protocol_version));
    }
    let name = join.player_name.trim();
    if name.is_empty() || name.len() > 32 || name.chars().any(|c| c.is_control()) {
        return Err(JoinRejection::InvalidName);
    }
    Ok(name.to_string())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be a Join.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let Ok(ClientMessage::Join(join)) = decode_client_message(&first_msg) else {
        tracing::debug!("First message was not a Join, closing");
        return;
    };
    let name = match validate_join(&join) {
        Ok(name) => name,
        Err(reason) => {
            tracing::warn!(player_name = %join.player_name, %reason, "Join rejected");
            let _ = ws_sender.send(Message::Close(None)).await;
            return;
        },
    };

    let player_id = state.allocate_player_id();

    // Subscribe before the welcome so no event after the snapshot is missed.
    let events = state.broadcast_tx.subscribe();
    let welcome = ServerMessage::Welcome(WelcomeMsg {
        player_id,
        state: state.current_state(),
        protocol_version: PROTOCOL_VERSION,
    });
    let Ok(encoded) = encode_server_message(&welcome) else {
        tracing::warn!("Failed to encode Welcome");
        return;
    };
    if ws_sender.send(Message::Binary(encoded.into())).await.is_err() {
        return;
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let forwarder = spawn_forwarder(events, tx, player_id);
    spawn_writer(ws_sender, rx);

    if !state.send_command(MatchCommand::PlayerJoined { player_id }) {
        forwarder.abort();
        return;
    }
    tracing::info!(player_id, player_name = %name, "Player connected");

    read_loop(&mut ws_receiver, &state, player_id).await;

    forwarder.abort();
    state.send_command(MatchCommand::PlayerLeft { player_id });
    tracing::info!(player_id, "Player disconnected");
}

/// Copy match broadcasts into this player's outbound queue.
fn spawn_forwarder(
    events: broadcast::Receiver<Bytes>,
    tx: mpsc::Sender<Bytes>,
    player_id: PlayerId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(data) => {
                    if tx.send(data).await.is_err() {
                        break;
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(player_id, skipped = n, "Player lagged behind match events");
                },
            }
        }
    })
}

fn spawn_writer(mut ws_sender: WsSink, mut rx: mpsc::Receiver<Bytes>) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(ws_receiver: &mut WsStream, state: &AppState, player_id: PlayerId) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let world = &state.services.world;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, "Rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let Ok(msg_type) = decode_message_type(&data) else {
            continue;
        };
        if !matches!(
            msg_type,
            MessageType::Join
                | MessageType::Pose
                | MessageType::Equip
                | MessageType::Rescue
                | MessageType::Leave
        ) {
            tracing::warn!(player_id, ?msg_type, "Rejected server-only message from client");
            continue;
        }

        let msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(player_id, error = %e, "Undecodable client message");
                continue;
            },
        };

        match msg {
            ClientMessage::Pose(p) => {
                if !p.pose.is_finite() || world.is_movement_locked(player_id) {
                    continue;
                }
                world.set_pose(player_id, p.pose);
                world.set_crouching(player_id, p.crouching);
            },
            ClientMessage::Equip(e) => world.set_tool_equipped(player_id, e.equipped),
            ClientMessage::Rescue(r) => {
                state.send_command(MatchCommand::Rescue {
                    rescuer: player_id,
                    target: r.target,
                });
            },
            ClientMessage::Leave(_) => break,
            ClientMessage::Join(_) => {
                tracing::debug!(player_id, "Ignoring repeated Join");
            },
        }
    }
}
