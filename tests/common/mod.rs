#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use obsidian_client::{ConnectOptions, NodeConfig, Result, Source, Track, TrackInfo, VoiceGateway};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

pub const PASSWORD: &str = "youshallnotpass";
pub const USER_ID: u64 = 1234;

/// In-process stand-in for an Obsidian node
///
/// Accepts any number of connections, checks the handshake headers and
/// forwards every text frame it receives as parsed JSON.
pub struct Backend {
    pub port: u16,
    received: mpsc::UnboundedReceiver<Value>,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
    pub connections: Arc<Mutex<u32>>,
}

impl Backend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(None));
        let connections = Arc::new(Mutex::new(0));

        let slot = current.clone();
        let count = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let count = count.clone();
                let callback = move |request: &Request, response: Response| {
                    let headers = request.headers();
                    let authorized = headers.get("Authorization").is_some_and(|v| v == PASSWORD)
                        && headers.get("User-Id").is_some_and(|v| v == &USER_ID.to_string())
                        && headers.get("Client-Name").is_some();
                    if authorized {
                        *count.lock().unwrap() += 1;
                        Ok(response)
                    } else {
                        let mut error = ErrorResponse::new(Some("invalid password".to_string()));
                        *error.status_mut() = StatusCode::UNAUTHORIZED;
                        Err(error)
                    }
                };

                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };

                let (mut write, mut read) = ws.split();
                let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Message>();
                *slot.lock().unwrap() = Some(push_tx);

                tokio::spawn(async move {
                    while let Some(message) = push_rx.recv().await {
                        let closing = matches!(message, Message::Close(_));
                        if write.send(message).await.is_err() || closing {
                            break;
                        }
                    }
                });

                let received_tx = received_tx.clone();
                tokio::spawn(async move {
                    while let Some(Ok(message)) = read.next().await {
                        if let Message::Text(text) = message {
                            if let Ok(value) = serde_json::from_str(&text) {
                                let _ = received_tx.send(value);
                            }
                        }
                    }
                });
            }
        });

        Self {
            port,
            received,
            current,
            connections,
        }
    }

    pub fn config(&self) -> NodeConfig {
        NodeConfig::new("127.0.0.1", self.port)
            .with_password(PASSWORD)
            .with_user_id(USER_ID)
            .with_reconnect(Duration::from_millis(10), Some(5))
    }

    /// Wait until the server side of the latest handshake can push frames
    pub async fn ready(&self) {
        let current = self.current.clone();
        eventually(move || {
            let ready = current.lock().unwrap().is_some();
            async move { ready }
        })
        .await;
    }

    /// Push one `{op, d}` frame to the most recent connection
    pub fn push(&self, op: u8, d: Value) {
        let frame = serde_json::json!({"op": op, "d": d}).to_string();
        if let Some(tx) = self.current.lock().unwrap().as_ref() {
            let _ = tx.send(Message::Text(frame));
        }
    }

    /// Close the most recent connection from the server side
    pub fn drop_connection(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.send(Message::Close(None));
        }
    }

    /// Next frame with the given op code, skipping others
    pub async fn expect_op(&mut self, op: u64) -> Value {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frame = self.received.recv().await.expect("backend channel closed");
                if frame["op"] == op {
                    return frame["d"].clone();
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no frame with op {op} within 5s"))
    }

    pub fn connection_count(&self) -> u32 {
        *self.connections.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Join { guild_id: u64, channel_id: u64 },
    Leave { guild_id: u64 },
}

#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceGateway for RecordingGateway {
    async fn join(&self, guild_id: u64, channel_id: u64, _options: ConnectOptions) -> Result<()> {
        self.calls.lock().unwrap().push(GatewayCall::Join { guild_id, channel_id });
        Ok(())
    }

    async fn leave(&self, guild_id: u64) -> Result<()> {
        self.calls.lock().unwrap().push(GatewayCall::Leave { guild_id });
        Ok(())
    }
}

pub fn track(title: &str, length: u64) -> Track {
    Track::new(
        format!("id-{title}"),
        TrackInfo {
            title: title.to_string(),
            author: "artist".to_string(),
            uri: format!("https://soundcloud.com/artist/{title}"),
            identifier: title.to_string(),
            length,
            position: 0,
            is_stream: false,
            is_seekable: true,
            source_name: Source::Soundcloud,
            thumbnail: None,
        },
    )
}

/// Poll `check` until it holds or a few seconds pass
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
