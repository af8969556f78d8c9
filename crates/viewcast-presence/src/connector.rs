//! Transport seam for the presence connection.
//!
//! The session task only sees `Connector` and `PresenceTransport`, so tests
//! can swap the WebSocket stack for scripted in-memory transports. The
//! production implementation wraps `tokio-tungstenite` with a handshake
//! timeout.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use viewcast_common::PresenceError;

/// One established bidirectional presence connection carrying text frames.
#[async_trait]
pub trait PresenceTransport: Send {
    async fn send(&mut self, text: String) -> Result<(), PresenceError>;

    /// Next text frame from the server. `Ok(None)` means the peer closed.
    async fn recv(&mut self) -> Result<Option<String>, PresenceError>;

    /// Close the connection. Best-effort; errors are swallowed because the
    /// connection is being abandoned either way.
    async fn close(&mut self);
}

/// Opens presence connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn PresenceTransport>, PresenceError>;
}

/// Build the connection URL for a livestream presence channel. The token is
/// supplied as a query parameter, the way the gateway expects it at
/// handshake time.
pub(crate) fn presence_url(base_url: &str, token: &str) -> String {
    format!("{}/livestream?token={token}", base_url.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production connector backed by `tokio-tungstenite`.
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn PresenceTransport>, PresenceError> {
        match tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
            .await
        {
            Ok(Ok((stream, _response))) => Ok(Box::new(WsTransport { inner: stream })),
            Ok(Err(e)) => Err(PresenceError::Connect(e.to_string())),
            Err(_elapsed) => Err(PresenceError::ConnectTimeout(self.connect_timeout.as_secs())),
        }
    }
}

struct WsTransport {
    inner: WsStream,
}

#[async_trait]
impl PresenceTransport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), PresenceError> {
        self.inner
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| PresenceError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>, PresenceError> {
        while let Some(frame) = self.inner.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => return Ok(Some(text.to_string())),
                Ok(WsMessage::Close(_)) => return Ok(None),
                // Ping/pong handled by tungstenite; binary frames ignored.
                Ok(_) => continue,
                Err(e) => return Err(PresenceError::Transport(e.to_string())),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
