//! WebSocket transport layer.
//!
//! This module handles the socket side of the relay: opening a connection to
//! the annotation server, writing frames, and reporting what happens on the
//! wire as discrete events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌──────────────────┐
//! │  ConnectionManager   │                          │  Annotation      │
//! │  (event loop task)   │        WebSocket         │  server          │
//! │                      │◄────────────────────────►│                  │
//! │  Connector → Socket  │      localhost:8000      │                  │
//! └──────────────────────┘                          └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `socket` | `Connector` / `Socket` traits and `SocketEvent` |
//! | `websocket` | `tokio-tungstenite` implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Transport traits and events.
pub mod socket;

/// WebSocket client transport.
pub mod websocket;

/// Scripted in-memory transport.
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use socket::{Connector, Socket, SocketEvent};
pub use websocket::{WsConnector, WsSocket};
