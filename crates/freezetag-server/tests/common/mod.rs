#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use freezetag_core::net::messages::{ClientMessage, JoinMsg, ServerMessage, WelcomeMsg};
use freezetag_core::net::protocol::{PROTOCOL_VERSION, decode_server_message, encode_client_message};

use freezetag_server::build_app;
use freezetag_server::config::ServerConfig;
use freezetag_server::state::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsClient {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsClient, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send a Join and return the Welcome.
pub async fn ws_join(stream: &mut WsClient, name: &str) -> WelcomeMsg {
    ws_send(
        stream,
        &ClientMessage::Join(JoinMsg {
            player_name: name.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_server_msg(stream).await {
        ServerMessage::Welcome(welcome) => welcome,
        other => panic!("Expected Welcome, got: {other:?}"),
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsClient) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsClient) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read until the server closes the socket, returning true if it did (2s timeout).
pub async fn ws_expect_close(stream: &mut WsClient) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(false)
}
