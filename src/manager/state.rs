//! Reconnection state machine.
//!
//! [`ReconnectMachine`] is the pure transition function behind the
//! connection manager. It owns no I/O: the event loop feeds it
//! [`TransportEvent`]s and carries out the returned [`Action`].
//!
//! # Transitions
//!
//! | From | Event | To | Action |
//! |------|-------|----|--------|
//! | `Connecting` | `Opened` | `Open` | reset attempts |
//! | `Connecting` / `Open` | `Closed` / `Errored`, attempts < max | `ClosedRetrying` | `ScheduleRetry` |
//! | `Connecting` / `Open` | `Closed` / `Errored`, attempts = max | `ClosedGivenUp` | `GiveUp` |
//! | `ClosedRetrying` | `RetryElapsed` | `Connecting` | `Connect` |
//!
//! Every other combination is ignored. In particular a close that follows
//! an error for the same socket does not schedule a second retry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use super::options::ReconnectPolicy;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The handshake completed; sends are accepted.
    Open,
    /// Waiting for the backoff timer before the next attempt.
    ClosedRetrying,
    /// Retries exhausted. Terminal.
    ClosedGivenUp,
}

impl ConnectionState {
    /// Returns `true` if no transition leaves this state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedGivenUp)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedRetrying => "closed-retrying",
            Self::ClosedGivenUp => "closed-given-up",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Snapshot of the connection published by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    pub reconnect_attempts: u32,
}

// ============================================================================
// TransportEvent / Action
// ============================================================================

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// Socket closed.
    Closed,
    /// Socket or connection attempt failed.
    Errored,
    /// Backoff timer fired.
    RetryElapsed,
}

/// What the event loop must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing.
    None,
    /// Start a timer; feed [`TransportEvent::RetryElapsed`] when it fires.
    ScheduleRetry {
        /// Retry number, 1-based.
        attempt: u32,
        /// Time to wait.
        delay: Duration,
    },
    /// Retries exhausted; stop trying.
    GiveUp,
    /// Open a new socket.
    Connect,
}

// ============================================================================
// ReconnectMachine
// ============================================================================

/// Pure reconnection state machine.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ReconnectMachine {
    /// Creates a machine in [`ConnectionState::Connecting`] with no attempts.
    #[inline]
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempts: 0,
            policy,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last open.
    #[inline]
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The policy this machine applies.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Current snapshot.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            reconnect_attempts: self.attempts,
        }
    }

    /// Applies one event and returns the resulting action.
    pub fn handle(&mut self, event: TransportEvent) -> Action {
        use ConnectionState::{ClosedGivenUp, ClosedRetrying, Connecting, Open};

        match (self.state, event) {
            (Connecting, TransportEvent::Opened) => {
                self.state = Open;
                self.attempts = 0;
                Action::None
            }

            (Connecting | Open, TransportEvent::Closed | TransportEvent::Errored) => {
                if self.policy.allows_retry(self.attempts) {
                    self.attempts += 1;
                    self.state = ClosedRetrying;
                    Action::ScheduleRetry {
                        attempt: self.attempts,
                        delay: self.policy.delay_for(self.attempts),
                    }
                } else {
                    self.state = ClosedGivenUp;
                    Action::GiveUp
                }
            }

            (ClosedRetrying, TransportEvent::RetryElapsed) => {
                self.state = Connecting;
                Action::Connect
            }

            _ => Action::None,
        }
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
