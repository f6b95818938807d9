//! Connection manager module.
//!
//! This module owns the relay's single WebSocket connection and its
//! reconnection behavior.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Handle to the connection and its event loop |
//! | [`ManagerBuilder`] | Fluent configuration builder |
//! | [`ReconnectPolicy`] | Retry bound and backoff pacing |
//! | [`ReconnectMachine`] | Pure transition function |
//!
//! # Example
//!
//! ```no_run
//! use annotation_relay::{Annotation, ConnectionManager};
//!
//! # async fn example() -> annotation_relay::Result<()> {
//! let manager = ConnectionManager::builder().start()?;
//! manager.send(Annotation::with_default_color("claim 1")).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for manager configuration.
pub mod builder;

/// Manager handle and event loop.
pub mod core;

/// Reconnection policy.
pub mod options;

/// Reconnection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{DEFAULT_URL, ManagerBuilder};
pub use core::{ConnectionManager, MessageHandler};
pub use options::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, ReconnectPolicy};
pub use state::{Action, ConnectionState, ConnectionStatus, ReconnectMachine, TransportEvent};
