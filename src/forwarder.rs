//! Selection forwarding.
//!
//! The page side of the relay: a text selection becomes an [`Annotation`]
//! and is submitted over a [`MessageChannel`]. The channel answers with a
//! [`ChannelResponse`] which the forwarder turns back into a `Result`.
//!
//! # Example
//!
//! ```no_run
//! use annotation_relay::{ConnectionManager, SelectionForwarder};
//!
//! # async fn example() -> annotation_relay::Result<()> {
//! let manager = ConnectionManager::builder().start()?;
//! let forwarder = SelectionForwarder::new(manager).with_color("yellow");
//!
//! forwarder.on_selection("a highlighted claim").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::manager::ConnectionManager;
use crate::protocol::{Annotation, ChannelRequest, ChannelResponse, DEFAULT_COLOR};

// ============================================================================
// MessageChannel
// ============================================================================

/// Request/response channel between the page and the connection manager.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Submits a request and waits for the answer. Never fails; failures
    /// come back as [`ChannelResponse::Error`].
    async fn submit(&self, request: ChannelRequest) -> ChannelResponse;
}

#[async_trait]
impl MessageChannel for ConnectionManager {
    async fn submit(&self, request: ChannelRequest) -> ChannelResponse {
        ChannelResponse::from(&self.send(request).await)
    }
}

#[async_trait]
impl<C: MessageChannel + ?Sized> MessageChannel for Arc<C> {
    async fn submit(&self, request: ChannelRequest) -> ChannelResponse {
        (**self).submit(request).await
    }
}

// ============================================================================
// SelectionForwarder
// ============================================================================

/// Turns page selections into save requests.
#[derive(Debug, Clone)]
pub struct SelectionForwarder<C> {
    channel: C,
    color: String,
}

impl<C: MessageChannel> SelectionForwarder<C> {
    /// Creates a forwarder that highlights in [`DEFAULT_COLOR`].
    #[inline]
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            color: DEFAULT_COLOR.to_string(),
        }
    }

    /// Sets the highlight color.
    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Highlight color used by [`on_selection`](Self::on_selection).
    #[inline]
    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Returns the underlying channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Handles a finished selection.
    ///
    /// An empty selection sends nothing and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AnnotationRejected`] if the channel answered
    /// with an error.
    pub async fn on_selection(&self, selected: &str) -> Result<Option<ChannelResponse>> {
        if selected.is_empty() {
            return Ok(None);
        }

        debug!(len = selected.len(), "Text selected");
        self.save_annotation(selected, &self.color).await.map(Some)
    }

    /// Submits one annotation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AnnotationRejected`] if the channel answered
    /// with an error.
    pub async fn save_annotation(&self, text: &str, color: &str) -> Result<ChannelResponse> {
        let request = ChannelRequest::from(Annotation::new(text, color));

        match self.channel.submit(request).await.into_result() {
            Ok(response) => {
                info!("Annotation sent to server");
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, "Failed to send annotation");
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::error::Error;

    /// Channel that records requests and answers with a fixed response.
    struct RecordingChannel {
        requests: Mutex<Vec<ChannelRequest>>,
        response: ChannelResponse,
    }

    impl RecordingChannel {
        fn answering(response: ChannelResponse) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                response,
            })
        }
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        async fn submit(&self, request: ChannelRequest) -> ChannelResponse {
            self.requests.lock().push(request);
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_selection_sent_in_default_color() {
        let channel = RecordingChannel::answering(ChannelResponse::Sent);
        let forwarder = SelectionForwarder::new(Arc::clone(&channel));

        let response = forwarder.on_selection("claim 1").await.expect("sent");
        assert_eq!(response, Some(ChannelResponse::Sent));

        let requests = channel.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].annotation(), &Annotation::new("claim 1", "blue"));
    }

    #[tokio::test]
    async fn test_empty_selection_ignored() {
        let channel = RecordingChannel::answering(ChannelResponse::Sent);
        let forwarder = SelectionForwarder::new(Arc::clone(&channel));

        assert_eq!(forwarder.on_selection("").await.expect("no-op"), None);
        assert!(channel.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_custom_color() {
        let channel = RecordingChannel::answering(ChannelResponse::Sent);
        let forwarder = SelectionForwarder::new(Arc::clone(&channel)).with_color("yellow");
        assert_eq!(forwarder.color(), "yellow");

        forwarder.on_selection("x").await.expect("sent");
        assert_eq!(channel.requests.lock()[0].annotation().color, "yellow");
    }

    #[tokio::test]
    async fn test_error_response_rejects() {
        let channel =
            RecordingChannel::answering(ChannelResponse::error("WebSocket is not connected"));
        let forwarder = SelectionForwarder::new(channel);

        let err = forwarder.on_selection("claim").await.unwrap_err();
        assert!(matches!(
            err,
            Error::AnnotationRejected { ref message } if message == "WebSocket is not connected"
        ));
    }

    #[tokio::test]
    async fn test_manager_as_channel_when_disconnected() {
        use crate::transport::testing::{FakeConnector, Outcome};

        let manager = ConnectionManager::builder()
            .connector(FakeConnector::new([Outcome::Hang]))
            .start()
            .expect("start");
        let forwarder = SelectionForwarder::new(manager);

        let err = forwarder.on_selection("claim").await.unwrap_err();
        assert!(matches!(err, Error::AnnotationRejected { .. }));
        assert_eq!(err.to_string(), "Annotation rejected: WebSocket is not connected");
    }
}
