//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! # Frame Handling
//!
//! | Frame | Result |
//! |-------|--------|
//! | Text | [`SocketEvent::Message`] |
//! | Close / end of stream | [`SocketEvent::Closed`] |
//! | Read error | [`SocketEvent::Error`] |
//! | Binary, Ping, Pong | ignored (pongs are queued by tungstenite) |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::socket::{Connector, Socket, SocketEvent};

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsConnector
// ============================================================================

/// Production [`Connector`] that opens real WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>> {
        debug!(%url, "Attempting to connect to WebSocket server");

        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        trace!(status = %response.status(), "Handshake response");

        Ok(Box::new(WsSocket { stream }))
    }
}

// ============================================================================
// WsSocket
// ============================================================================

/// An open WebSocket connection.
pub struct WsSocket {
    stream: WsStream,
}

#[async_trait]
impl Socket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return SocketEvent::Message(text.as_str().to_owned());
                }

                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return SocketEvent::Closed;
                }

                Some(Err(e)) => return SocketEvent::Error(e.to_string()),

                None => {
                    debug!("WebSocket stream ended");
                    return SocketEvent::Closed;
                }

                // Ignore Binary, Ping, Pong, raw frames
                Some(Ok(_)) => {}
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
