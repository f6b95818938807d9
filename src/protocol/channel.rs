//! Message channel request and response types.
//!
//! The page side submits a [`ChannelRequest`] and receives a
//! [`ChannelResponse`] telling it whether the annotation went out.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::OutboundMessage;

// ============================================================================
// ChannelRequest
// ============================================================================

/// A request arriving over the message channel.
///
/// Typed requests share the wire shape of [`OutboundMessage`].
pub type ChannelRequest = OutboundMessage;

/// The only action the relay answers on the message channel.
const SAVE_ANNOTATION: &str = "save_annotation";

/// Decodes a raw channel message.
///
/// Dispatch looks only at the `action` field:
///
/// | Input | Result |
/// |-------|--------|
/// | `action` missing or not `save_annotation` | `None` |
/// | `save_annotation` with a valid annotation | `Some(Ok(raw))`, unchanged |
/// | `save_annotation` with a malformed annotation | `Some(Err(Error::InvalidRequest))` |
///
/// A valid request is returned as received, so fields beyond the wire shape
/// reach the server untouched.
#[must_use]
pub fn decode_request(raw: Value) -> Option<Result<Value>> {
    if raw.get("action").and_then(Value::as_str) != Some(SAVE_ANNOTATION) {
        return None;
    }

    match OutboundMessage::deserialize(&raw) {
        Ok(_) => Some(Ok(raw)),
        Err(e) => Some(Err(Error::invalid_request(e.to_string()))),
    }
}

// ============================================================================
// ChannelResponse
// ============================================================================

/// The answer sent back over the message channel.
///
/// # Format
///
/// Success:
/// ```json
/// { "status": "sent" }
/// ```
///
/// Error:
/// ```json
/// { "status": "error", "message": "WebSocket is not connected" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChannelResponse {
    /// The message was handed to an open socket.
    Sent,

    /// The message was not transmitted.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ChannelResponse {
    /// Creates an error response.
    #[inline]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Converts an error response into [`Error::AnnotationRejected`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AnnotationRejected`] if the status was `error`.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Sent => Ok(Self::Sent),
            Self::Error { message } => Err(Error::annotation_rejected(message)),
        }
    }
}

impl From<&Result<()>> for ChannelResponse {
    fn from(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(e) => Self::error(e.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
