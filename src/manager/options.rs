//! Reconnection policy.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use annotation_relay::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::new()
//!     .with_max_attempts(3)
//!     .with_base_delay(Duration::from_millis(500));
//!
//! assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
//! assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Consecutive failed attempts tolerated before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Multiplier for the exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Bounds and pacing for automatic reconnection.
///
/// The delay before retry number `n` (1-based) is `2^n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries allowed before the manager gives up for good.
    pub max_attempts: u32,

    /// Backoff multiplier.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ReconnectPolicy {
    /// Creates the default policy: 5 attempts, 1s base (2s, 4s, 8s, 16s, 32s).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ReconnectPolicy {
    /// Sets the maximum number of retries.
    #[inline]
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

// ============================================================================
// Backoff
// ============================================================================

impl ReconnectPolicy {
    /// Delay before retry number `attempt`.
    ///
    /// Saturates instead of overflowing for large attempt counts.
    #[inline]
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Returns `true` if another retry is allowed after `attempts` retries.
    #[inline]
    #[must_use]
    pub const fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

// ============================================================================
// Tests
// ============================================================================
