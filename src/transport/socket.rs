//! Transport abstraction.
//!
//! The connection manager never touches a WebSocket directly. It asks a
//! [`Connector`] for a [`Socket`] and turns everything the socket reports
//! into discrete [`SocketEvent`]s.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

// ============================================================================
// SocketEvent
// ============================================================================

/// Something the transport observed on an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame arrived.
    Message(String),

    /// The peer closed the connection or the stream ended.
    Closed,

    /// The transport failed. The socket is unusable afterwards.
    Error(String),
}

// ============================================================================
// Socket
// ============================================================================

/// An open, handshaken connection.
///
/// `next_event` must be cancel-safe: it is raced against caller commands
/// inside `tokio::select!`.
#[async_trait]
pub trait Socket: Send {
    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be written.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Waits for the next event. Non-text frames are consumed silently.
    async fn next_event(&mut self) -> SocketEvent;

    /// Closes the socket, ignoring failures.
    async fn close(&mut self);
}

// ============================================================================
// Connector
// ============================================================================

/// Opens sockets to an endpoint.
///
/// Resolves once the handshake has completed, or fails. There is no timeout
/// on the attempt itself; the transport decides when it has failed.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connection`] if the handshake fails.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>>;
}
