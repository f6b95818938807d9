//! Annotation and outbound message types.
//!
//! These are the payloads carried from the page to the annotation server.
//! An [`Annotation`] lives only between the selection event and its
//! serialization into an [`OutboundMessage`].

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Highlight color used when the caller does not pick one.
pub const DEFAULT_COLOR: &str = "blue";

// ============================================================================
// Annotation
// ============================================================================

/// A highlighted piece of page text.
///
/// # Format
///
/// ```json
/// { "text": "selected text", "color": "blue" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// The selected text.
    pub text: String,

    /// Highlight color name.
    pub color: String,
}

impl Annotation {
    /// Creates a new annotation.
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
        }
    }

    /// Creates an annotation with [`DEFAULT_COLOR`].
    #[inline]
    #[must_use]
    pub fn with_default_color(text: impl Into<String>) -> Self {
        Self::new(text, DEFAULT_COLOR)
    }
}

// ============================================================================
// OutboundMessage
// ============================================================================

/// The wire payload sent to the annotation server.
///
/// Tagged by `action`; `save_annotation` is the only action.
///
/// # Format
///
/// ```json
/// {
///   "action": "save_annotation",
///   "annotation": { "text": "...", "color": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Persist an annotation on the server.
    SaveAnnotation {
        /// The annotation to save.
        annotation: Annotation,
    },
}

impl OutboundMessage {
    /// Returns the `action` tag as it appears on the wire.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::SaveAnnotation { .. } => "save_annotation",
        }
    }

    /// Returns the carried annotation.
    #[inline]
    #[must_use]
    pub fn annotation(&self) -> &Annotation {
        match self {
            Self::SaveAnnotation { annotation } => annotation,
        }
    }
}

impl From<Annotation> for OutboundMessage {
    fn from(annotation: Annotation) -> Self {
        Self::SaveAnnotation { annotation }
    }
}

// ============================================================================
// Tests
// ============================================================================
