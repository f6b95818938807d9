//! Builder pattern for connection manager configuration.
//!
//! Provides a fluent API for configuring and starting a
//! [`ConnectionManager`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use annotation_relay::ConnectionManager;
//!
//! # async fn example() -> annotation_relay::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .url("ws://localhost:9000")
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(500))
//!     .start()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, WsConnector};

use super::core::ConnectionManager;
use super::options::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Endpoint used when none is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8000";

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ManagerBuilder {
    /// Endpoint URL, unvalidated.
    url: Option<String>,
    /// Reconnection policy.
    policy: ReconnectPolicy,
    /// Transport override.
    connector: Option<Arc<dyn Connector>>,
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ManagerBuilder Implementation
// ============================================================================

impl ManagerBuilder {
    /// Creates a builder with the default endpoint and policy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: None,
            policy: ReconnectPolicy::new(),
            connector: None,
        }
    }

    /// Sets the WebSocket endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces the whole reconnection policy.
    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the number of retries before giving up.
    #[inline]
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy = self.policy.with_max_attempts(max_attempts);
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.policy = self.policy.with_base_delay(base_delay);
        self
    }

    /// Uses a custom transport instead of [`WsConnector`].
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(connector);
        self.connector = Some(connector);
        self
    }

    /// Validates the configuration and starts the manager.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the endpoint does not parse or is not `ws`/`wss`
    /// - [`Error::Config`] if the base delay is zero
    pub fn start(self) -> Result<ConnectionManager> {
        let url = self.validate_url()?;
        let policy = self.validate_policy()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector) as Arc<dyn Connector>);

        Ok(ConnectionManager::spawn(url, policy, connector))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerBuilder {
    /// Validates the endpoint URL.
    fn validate_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().unwrap_or(DEFAULT_URL);

        let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_url(
                raw,
                format!("unsupported scheme '{other}', expected ws or wss"),
            )),
        }
    }

    /// Validates the reconnection policy.
    fn validate_policy(&self) -> Result<ReconnectPolicy> {
        if self.policy.base_delay.is_zero() {
            return Err(Error::config(
                "Reconnect base delay must be greater than zero.\n\
                 Example: ConnectionManager::builder().base_delay(Duration::from_secs(1))",
            ));
        }

        Ok(self.policy)
    }
}

// ============================================================================
// Tests
// ============================================================================
