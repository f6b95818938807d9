//! Wire and channel message types.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ChannelRequest` | Page → Relay | Ask the relay to save an annotation |
//! | `OutboundMessage` | Relay → Server | JSON text frame over WebSocket |
//! | (any JSON) | Server → Relay | Logged; optionally handed to a handler |
//! | `ChannelResponse` | Relay → Page | `sent` or `error` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `annotation` | Annotation and outbound wire message |
//! | `channel` | Message channel request/response |

// ============================================================================
// Submodules
// ============================================================================

/// Annotation and outbound wire message.
pub mod annotation;

/// Message channel request and response.
pub mod channel;

// ============================================================================
// Re-exports
// ============================================================================

pub use annotation::{Annotation, DEFAULT_COLOR, OutboundMessage};
pub use channel::{ChannelRequest, ChannelResponse, decode_request};
