use crate::config::NodeConfig;
use crate::error::{ObsidianError, Result};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Read half of a node socket
pub(crate) type Inbound = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Write half of a node socket
///
/// Outgoing frames go through an unbounded channel to a writer task, so
/// sending never waits on the socket.
pub(crate) struct Connection {
    ws_tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Perform the authenticated handshake against `config.ws_url()`
    pub(crate) async fn connect(config: &NodeConfig) -> Result<(Self, Inbound)> {
        let url = config.ws_url();
        tracing::info!("NODE {:?} | Connecting to {}", config.identifier, url);

        let request = handshake_request(config)?;
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| handshake_error(&config.identifier, e))?;
        let (mut write, read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let identifier = config.identifier.clone();

        tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    tracing::error!("NODE {:?} | Failed to send message: {}", identifier, e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok((Self { ws_tx }, read))
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.ws_tx.is_closed()
    }

    /// Queue one text frame, returning `false` once the writer is gone
    pub(crate) fn send(&self, text: String) -> bool {
        self.ws_tx.send(Message::Text(text)).is_ok()
    }

    /// Send a close frame; the writer task exits afterwards
    pub(crate) fn close(&self) {
        let _ = self.ws_tx.send(Message::Close(None));
    }
}

fn handshake_request(config: &NodeConfig) -> Result<tungstenite::handshake::client::Request> {
    let mut request = config
        .ws_url()
        .into_client_request()
        .map_err(|source| ObsidianError::ConnectionFailure {
            identifier: config.identifier.clone(),
            source,
        })?;

    let header = |name: &str, value: &str| {
        HeaderValue::from_str(value)
            .map_err(|_| ObsidianError::InvalidConfig(format!("{name} header value is not valid")))
    };

    let headers = request.headers_mut();
    headers.insert("Authorization", header("Authorization", &config.password)?);
    headers.insert("User-Id", header("User-Id", &config.user_id.to_string())?);
    headers.insert("Client-Name", header("Client-Name", &config.client_name)?);

    Ok(request)
}

fn handshake_error(identifier: &str, error: tungstenite::Error) -> ObsidianError {
    if let tungstenite::Error::Http(response) = &error {
        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::error!("NODE {:?} | Invalid authorization", identifier);
            return ObsidianError::AuthorizationFailure {
                identifier: identifier.to_string(),
            };
        }
    }

    tracing::error!("NODE {:?} | Failed to connect: {}", identifier, error);
    ObsidianError::ConnectionFailure {
        identifier: identifier.to_string(),
        source: error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    #[test]
    fn handshake_carries_auth_headers() {
        let config = NodeConfig::new("localhost", 3030)
            .with_password("youshallnotpass")
            .with_user_id(42);
        let request = handshake_request(&config).unwrap();

        assert_eq!(request.uri(), "ws://localhost:3030/magma");
        assert_eq!(request.headers()["Authorization"], "youshallnotpass");
        assert_eq!(request.headers()["User-Id"], "42");
        assert_eq!(request.headers()["Client-Name"], "Obsidian");
    }

    #[test]
    fn unauthorized_handshake_is_authorization_failure() {
        let response = Response::builder().status(401).body(None).unwrap();
        let err = handshake_error("MAIN", tungstenite::Error::Http(response));
        assert!(matches!(err, ObsidianError::AuthorizationFailure { .. }));
        assert!(err.is_connection_failure());

        let response = Response::builder().status(500).body(None).unwrap();
        let err = handshake_error("MAIN", tungstenite::Error::Http(response));
        assert!(matches!(err, ObsidianError::ConnectionFailure { .. }));
    }

    #[test]
    fn invalid_password_header_is_rejected() {
        let config = NodeConfig::default().with_password("line\nbreak");
        assert!(matches!(
            handshake_request(&config),
            Err(ObsidianError::InvalidConfig(_))
        ));
    }
}
