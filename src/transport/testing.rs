//! Scripted in-memory transport for exercising the connection manager
//! without real sockets.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::error::{Error, Result};

use super::socket::{Connector, Socket, SocketEvent};

// ============================================================================
// Outcome
// ============================================================================

/// What the next `connect` call does.
pub(crate) enum Outcome {
    /// Fail the handshake.
    Refuse,
    /// Complete the handshake with the given socket.
    Accept(FakeSocket),
    /// Never resolve.
    Hang,
}

// ============================================================================
// FakeConnector
// ============================================================================

/// Connector that plays back a script of outcomes and records when each
/// attempt happened. An exhausted script refuses.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    inner: Arc<Mutex<FakeConnectorInner>>,
}

#[derive(Default)]
struct FakeConnectorInner {
    script: VecDeque<Outcome>,
    attempts: Vec<Instant>,
}

impl FakeConnector {
    pub(crate) fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        let connector = Self::default();
        connector.inner.lock().script.extend(script);
        connector
    }

    /// Appends an outcome to the script.
    pub(crate) fn push(&self, outcome: Outcome) {
        self.inner.lock().script.push_back(outcome);
    }

    /// Times at which `connect` was called.
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.inner.lock().attempts.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Socket>> {
        let outcome = {
            let mut inner = self.inner.lock();
            inner.attempts.push(Instant::now());
            inner.script.pop_front()
        };

        match outcome {
            Some(Outcome::Accept(socket)) => Ok(Box::new(socket)),
            Some(Outcome::Hang) => std::future::pending().await,
            Some(Outcome::Refuse) | None => Err(Error::connection("connection refused")),
        }
    }
}

// ============================================================================
// FakeSocket / FakeRemote
// ============================================================================

/// Socket half handed to the manager.
pub(crate) struct FakeSocket {
    events: mpsc::UnboundedReceiver<SocketEvent>,
    sent: mpsc::UnboundedSender<String>,
}

/// Test half: injects events and observes transmitted frames.
pub(crate) struct FakeRemote {
    events: mpsc::UnboundedSender<SocketEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

/// Creates a connected socket/remote pair.
pub(crate) fn socket_pair() -> (FakeSocket, FakeRemote) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();

    (
        FakeSocket {
            events: events_rx,
            sent: sent_tx,
        },
        FakeRemote {
            events: events_tx,
            sent: sent_rx,
        },
    )
}

impl FakeRemote {
    /// Delivers an event to the manager's socket.
    pub(crate) fn emit(&self, event: SocketEvent) {
        let _ = self.events.send(event);
    }

    /// Next frame the manager transmitted, if any is queued.
    pub(crate) fn try_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }
}

#[async_trait]
impl Socket for FakeSocket {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn next_event(&mut self) -> SocketEvent {
        self.events.recv().await.unwrap_or(SocketEvent::Closed)
    }

    async fn close(&mut self) {
        self.events.close();
    }
}
