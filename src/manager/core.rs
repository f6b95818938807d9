//! Connection manager and its event loop.
//!
//! The [`ConnectionManager`] owns the single WebSocket connection to the
//! annotation server for the lifetime of the process.
//!
//! # Event Loop
//!
//! One tokio task owns the socket, the retry timer and the
//! [`ReconnectMachine`]. It is always in exactly one phase:
//!
//! - **Connecting**: awaiting the handshake; sends are rejected
//! - **Open**: forwarding sends, logging inbound JSON
//! - **Retrying**: sleeping out the backoff; sends are rejected
//! - **Given up**: rejecting sends until shut down
//!
//! Transport events and caller commands are multiplexed with
//! `tokio::select!`, so every transition is serialized.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{ChannelResponse, OutboundMessage, decode_request};
use crate::transport::{Connector, Socket, SocketEvent};

use super::builder::ManagerBuilder;
use super::options::ReconnectPolicy;
use super::state::{Action, ConnectionState, ConnectionStatus, ReconnectMachine, TransportEvent};

// ============================================================================
// Types
// ============================================================================

/// Inbound message callback.
///
/// Called with every text frame from the server that parses as JSON.
pub type MessageHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Installed handler, cloned out of the lock before it runs.
type SharedHandler = Arc<Mutex<Option<Arc<dyn Fn(Value) + Send + Sync>>>>;

/// Commands for the event loop.
enum ManagerCommand {
    /// Transmit a serialized frame if the socket is open.
    Send {
        frame: String,
        reply_tx: oneshot::Sender<Result<()>>,
    },
    /// Stop the event loop.
    Shutdown,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Handle to the process-wide connection.
///
/// Cheap to clone; every clone talks to the same event loop. The loop stops
/// on [`shutdown`](Self::shutdown) or once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use annotation_relay::{Annotation, ConnectionManager};
///
/// # async fn example() -> annotation_relay::Result<()> {
/// let manager = ConnectionManager::builder()
///     .url("ws://localhost:8000")
///     .start()?;
///
/// manager.send(Annotation::new("claim 1", "blue")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ManagerCommand>,
    /// Latest status published by the event loop.
    status_rx: watch::Receiver<ConnectionStatus>,
    /// Inbound message handler (shared with event loop).
    message_handler: SharedHandler,
    /// Endpoint.
    url: Arc<Url>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_str())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Spawns the event loop, which immediately makes the first attempt.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(url: Url, policy: ReconnectPolicy, connector: Arc<dyn Connector>) -> Self {
        let machine = ReconnectMachine::new(policy);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(machine.status());
        let message_handler: SharedHandler = Arc::new(Mutex::new(None));

        let event_loop = EventLoop {
            url: url.clone(),
            connector,
            machine,
            commands: command_rx,
            status_tx,
            message_handler: Arc::clone(&message_handler),
        };

        tokio::spawn(event_loop.run());

        Self {
            command_tx,
            status_rx,
            message_handler,
            url: Arc::new(url),
        }
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Transmits a message if the socket is open at the time the event loop
    /// handles the request.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the socket is not open
    /// - [`Error::ConnectionClosed`] if the manager was shut down
    /// - [`Error::Json`] / [`Error::WebSocket`] if writing the frame failed
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> Result<()> {
        let message = message.into();
        let frame = serde_json::to_string(&message)?;
        trace!(action = message.action(), "Queueing message");
        self.send_frame(frame).await
    }

    /// Handles a raw message-channel request.
    ///
    /// Returns `None` for actions the relay does not handle, so the caller
    /// can leave the request for another listener. Every `save_annotation`
    /// request gets a response: a malformed one is answered with an error
    /// and a valid one is forwarded as received.
    pub async fn handle_request(&self, raw: Value) -> Option<ChannelResponse> {
        let Some(decoded) = decode_request(raw) else {
            trace!("Ignoring unhandled channel request");
            return None;
        };

        let result = match decoded {
            Ok(request) => self.send_frame(request.to_string()).await,
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            debug!(error = %e, "Channel request not sent");
        }

        Some(ChannelResponse::from(&result))
    }

    /// Hands a frame to the event loop and waits for the outcome.
    async fn send_frame(&self, frame: String) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::Send { frame, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Latest published status.
    ///
    /// Advisory only: [`send`](Self::send) checks the live socket.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Latest published state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Returns `true` if the last published state is `Open`.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Subscribes to status changes.
    #[inline]
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Endpoint this manager connects to.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sets the inbound message handler.
    ///
    /// May be called from inside a running handler.
    pub fn set_message_handler(&self, handler: MessageHandler) {
        let mut guard = self.message_handler.lock();
        *guard = Some(Arc::from(handler));
    }

    /// Clears the inbound message handler.
    pub fn clear_message_handler(&self) {
        let mut guard = self.message_handler.lock();
        *guard = None;
    }

    /// Stops the event loop and closes the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ManagerCommand::Shutdown);
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// State owned by the event loop task.
struct EventLoop {
    url: Url,
    connector: Arc<dyn Connector>,
    machine: ReconnectMachine,
    commands: mpsc::UnboundedReceiver<ManagerCommand>,
    status_tx: watch::Sender<ConnectionStatus>,
    message_handler: SharedHandler,
}

impl EventLoop {
    async fn run(mut self) {
        info!(url = %self.url, "Attempting to connect to WebSocket server");

        loop {
            let Some(outcome) = self.connect().await else {
                break;
            };

            let event = match outcome {
                Ok(mut socket) => {
                    self.apply(TransportEvent::Opened);
                    info!(url = %self.url, "WebSocket connection established");

                    let event = self.serve_open(socket.as_mut()).await;
                    if event.is_none() {
                        socket.close().await;
                    }
                    event
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket connection attempt failed");
                    Some(TransportEvent::Errored)
                }
            };

            let Some(event) = event else {
                break;
            };

            match self.apply(event) {
                Action::ScheduleRetry { attempt, delay } => {
                    info!(
                        attempt,
                        max = self.machine.policy().max_attempts,
                        delay_ms = millis(delay),
                        "Attempting to reconnect"
                    );

                    if !self.wait_retry(delay).await {
                        break;
                    }

                    self.apply(TransportEvent::RetryElapsed);
                    debug!(attempt, "Reconnecting");
                }

                Action::GiveUp => {
                    error!(
                        attempts = self.machine.attempts(),
                        "Maximum reconnection attempts reached. Please check if the server is running."
                    );
                    self.serve_given_up().await;
                    break;
                }

                Action::None | Action::Connect => {}
            }
        }

        debug!(state = %self.machine.state(), "Event loop terminated");
    }

    /// Feeds an event to the machine and publishes the new status.
    fn apply(&mut self, event: TransportEvent) -> Action {
        let action = self.machine.handle(event);
        self.status_tx.send_replace(self.machine.status());
        trace!(?event, ?action, state = %self.machine.state(), "Transition");
        action
    }

    /// Connecting phase. `None` means stop.
    async fn connect(&mut self) -> Option<Result<Box<dyn Socket>>> {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let attempt = async move { connector.connect(&url).await };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => return Some(result),

                command = self.commands.recv() => {
                    if !Self::reject(command) {
                        return None;
                    }
                }
            }
        }
    }

    /// Open phase. Returns the event that ended it, or `None` to stop.
    async fn serve_open(&mut self, socket: &mut dyn Socket) -> Option<TransportEvent> {
        loop {
            tokio::select! {
                event = socket.next_event() => match event {
                    SocketEvent::Message(text) => self.handle_inbound(&text),

                    SocketEvent::Closed => {
                        info!("WebSocket connection closed");
                        return Some(TransportEvent::Closed);
                    }

                    SocketEvent::Error(message) => {
                        error!(error = %message, "WebSocket error");
                        return Some(TransportEvent::Errored);
                    }
                },

                command = self.commands.recv() => match command {
                    Some(ManagerCommand::Send { frame, reply_tx }) => {
                        let result = Self::transmit(socket, frame).await;
                        let _ = reply_tx.send(result);
                    }

                    Some(ManagerCommand::Shutdown) => {
                        debug!("Shutdown command received");
                        return None;
                    }

                    None => {
                        debug!("Command channel closed");
                        return None;
                    }
                },
            }
        }
    }

    /// Backoff phase. Returns `false` to stop.
    async fn wait_retry(&mut self, delay: Duration) -> bool {
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return true,

                command = self.commands.recv() => {
                    if !Self::reject(command) {
                        return false;
                    }
                }
            }
        }
    }

    /// Terminal phase: answer every send with an error until stopped.
    async fn serve_given_up(&mut self) {
        while Self::reject(self.commands.recv().await) {}
    }

    /// Answers a command while no socket is open. Returns `false` to stop.
    fn reject(command: Option<ManagerCommand>) -> bool {
        match command {
            Some(ManagerCommand::Send { frame, reply_tx }) => {
                debug!(len = frame.len(), "Send rejected: not connected");
                let _ = reply_tx.send(Err(Error::NotConnected));
                true
            }
            Some(ManagerCommand::Shutdown) => {
                debug!("Shutdown command received");
                false
            }
            None => {
                debug!("Command channel closed");
                false
            }
        }
    }

    /// Writes one text frame.
    async fn transmit(socket: &mut dyn Socket, frame: String) -> Result<()> {
        let len = frame.len();
        socket.send_text(frame).await?;
        trace!(len, "Message sent");
        Ok(())
    }

    /// Logs an inbound frame and hands parsed JSON to the handler.
    fn handle_inbound(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                debug!(payload = %value, "Message from server");
                let handler = self.message_handler.lock().clone();
                if let Some(handler) = handler {
                    handler(value);
                }
            }
            Err(e) => {
                warn!(error = %e, text = %text, "Error parsing message from server");
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds in `delay`, saturating at `u64::MAX`.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use crate::protocol::Annotation;
    use crate::transport::testing::{FakeConnector, FakeRemote, Outcome, socket_pair};

    fn start(connector: &FakeConnector) -> ConnectionManager {
        ConnectionManager::spawn(
            Url::parse("ws://localhost:8000").expect("valid url"),
            ReconnectPolicy::default(),
            Arc::new(connector.clone()),
        )
    }

    fn accept(connector: &FakeConnector) -> FakeRemote {
        let (socket, remote) = socket_pair();
        connector.push(Outcome::Accept(socket));
        remote
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.watch_status();
        rx.wait_for(|s| s.state == state)
            .await
            .expect("event loop alive");
    }

    fn gaps(attempts: &[Instant]) -> Vec<u128> {
        attempts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_and_give_up() {
        let connector = FakeConnector::default();
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::ClosedGivenUp).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 6);
        assert_eq!(gaps(&attempts), vec![2000, 4000, 8000, 16000, 32000]);
        assert_eq!(manager.status().reconnect_attempts, 5);

        // No sixth retry, however long we wait.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(connector.attempts().len(), 6);
        assert_eq!(manager.state(), ConnectionState::ClosedGivenUp);

        let err = assert_err!(manager.send(Annotation::new("late", "blue")).await);
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_close_schedules_two_second_retry() {
        let connector = FakeConnector::default();
        let remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;
        let closed_at = Instant::now();
        remote.emit(SocketEvent::Closed);

        wait_for_state(&manager, ConnectionState::ClosedRetrying).await;
        assert_eq!(manager.status().reconnect_attempts, 1);

        let _remote = accept(&connector);
        wait_for_state(&manager, ConnectionState::Open).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!((attempts[1] - closed_at).as_millis(), 2000);
        assert_eq!(manager.status().reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resets_attempts() {
        let connector = FakeConnector::new([Outcome::Refuse, Outcome::Refuse, Outcome::Refuse]);
        let _remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;

        assert_eq!(connector.attempts().len(), 4);
        assert_eq!(gaps(&connector.attempts()), vec![2000, 4000, 8000]);
        assert_eq!(manager.status().reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_open_transmits_json() {
        let connector = FakeConnector::default();
        let mut remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;
        assert!(manager.is_connected());

        assert_ok!(manager.send(Annotation::new("claim 1", "yellow")).await);

        let frame = remote.try_sent().expect("frame transmitted");
        let value: Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(
            value,
            json!({
                "action": "save_annotation",
                "annotation": { "text": "claim 1", "color": "yellow" }
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_connecting_fails() {
        let connector = FakeConnector::new([Outcome::Hang]);
        let manager = start(&connector);

        let err = assert_err!(manager.send(Annotation::new("x", "blue")).await);
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_retrying_fails_without_transmission() {
        let connector = FakeConnector::default();
        let mut remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;
        remote.emit(SocketEvent::Error("reset by peer".into()));
        wait_for_state(&manager, ConnectionState::ClosedRetrying).await;

        let err = assert_err!(manager.send(Annotation::new("x", "blue")).await);
        assert!(matches!(err, Error::NotConnected));
        assert!(remote.try_sent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_inbound_is_swallowed() {
        let connector = FakeConnector::default();
        let remote = accept(&connector);
        let manager = start(&connector);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        manager.set_message_handler(Box::new(move |value: Value| {
            let _ = seen_tx.send(value);
        }));

        wait_for_state(&manager, ConnectionState::Open).await;
        remote.emit(SocketEvent::Message("not json {".into()));
        remote.emit(SocketEvent::Message(r#"{"status":"saved"}"#.into()));

        let value = seen_rx.recv().await.expect("valid message delivered");
        assert_eq!(value, json!({ "status": "saved" }));
        assert!(seen_rx.try_recv().is_err());

        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(manager.status().reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_request() {
        let connector = FakeConnector::new([Outcome::Hang]);
        let manager = start(&connector);

        let response = manager
            .handle_request(json!({
                "action": "save_annotation",
                "annotation": { "text": "abc", "color": "blue" }
            }))
            .await;
        assert_eq!(
            response,
            Some(ChannelResponse::error("WebSocket is not connected"))
        );

        let ignored = manager.handle_request(json!({ "action": "other" })).await;
        assert!(ignored.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_request_while_open_forwards_frame() {
        let connector = FakeConnector::default();
        let mut remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;

        let request = json!({
            "action": "save_annotation",
            "annotation": { "text": "abc", "color": "blue", "page": 4 },
            "patent_id": "US-123"
        });
        let response = manager.handle_request(request.clone()).await;
        assert_eq!(response, Some(ChannelResponse::Sent));

        let frame = remote.try_sent().expect("frame transmitted");
        let value: Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value, request);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_request_malformed_annotation() {
        let connector = FakeConnector::default();
        let mut remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;

        let response = manager
            .handle_request(json!({
                "action": "save_annotation",
                "annotation": { "text": "abc" }
            }))
            .await;
        let Some(ChannelResponse::Error { message }) = response else {
            panic!("expected error response, got {response:?}");
        };
        assert!(message.starts_with("Invalid request"));
        assert!(message.contains("color"));

        assert!(remote.try_sent().is_none());
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_can_clear_itself() {
        let connector = FakeConnector::default();
        let mut remote = accept(&connector);
        let manager = start(&connector);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let handle = manager.clone();
        manager.set_message_handler(Box::new(move |value: Value| {
            handle.clear_message_handler();
            let _ = seen_tx.send(value);
        }));

        wait_for_state(&manager, ConnectionState::Open).await;
        remote.emit(SocketEvent::Message(r#"{"n":1}"#.into()));
        remote.emit(SocketEvent::Message(r#"{"n":2}"#.into()));

        assert_eq!(seen_rx.recv().await, Some(json!({ "n": 1 })));

        // The loop keeps serving commands after the handler removed itself.
        assert_ok!(manager.send(Annotation::new("after", "blue")).await);
        assert!(remote.try_sent().is_some());
        assert!(seen_rx.try_recv().is_err());
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(32_000)), 32_000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let connector = FakeConnector::default();
        let _remote = accept(&connector);
        let manager = start(&connector);

        wait_for_state(&manager, ConnectionState::Open).await;
        manager.shutdown();

        let err = assert_err!(manager.send(Annotation::new("x", "blue")).await);
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
