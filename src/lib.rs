//! Annotation relay - reconnecting WebSocket bridge for page annotations.
//!
//! This library carries text-selection annotations from a page to a local
//! annotation server over a single WebSocket connection, reconnecting with
//! bounded exponential backoff when the connection drops.
//!
//! # Architecture
//!
//! ```text
//! SelectionForwarder ──► MessageChannel ──► ConnectionManager ──► WebSocket ──► server
//!        ▲                                        │
//!        └──────────── ChannelResponse ◄──────────┘
//! ```
//!
//! Key design principles:
//!
//! - One [`ConnectionManager`] owns one socket for the process lifetime
//! - Reconnection is a pure state machine ([`ReconnectMachine`]) driven by
//!   discrete transport events
//! - Retries wait `2^n` seconds and stop for good after five
//! - Sends while disconnected are reported, never raised
//!
//! # Quick Start
//!
//! ```no_run
//! use annotation_relay::{ConnectionManager, Result, SelectionForwarder};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .url("ws://localhost:8000")
//!         .start()?;
//!
//!     let forwarder = SelectionForwarder::new(manager.clone());
//!     forwarder.on_selection("selected text").await?;
//!
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | Connection manager, builder, reconnect state machine |
//! | [`forwarder`] | Selection forwarder and message channel |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Wire and channel message types |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Selection forwarder and message channel.
pub mod forwarder;

/// Connection manager and reconnection state machine.
///
/// Use [`ConnectionManager::builder()`] to configure and start a manager.
pub mod manager;

/// Wire and channel message types.
pub mod protocol;

/// WebSocket transport layer.
///
/// The [`Connector`] and [`Socket`] traits are the seam for swapping the
/// transport out.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Forwarder types
pub use forwarder::{MessageChannel, SelectionForwarder};

// Manager types
pub use manager::{
    ConnectionManager, ConnectionState, ConnectionStatus, ManagerBuilder, MessageHandler,
    ReconnectMachine, ReconnectPolicy,
};

// Protocol types
pub use protocol::{Annotation, ChannelRequest, ChannelResponse, OutboundMessage};

// Transport types
pub use transport::{Connector, Socket, SocketEvent, WsConnector};
