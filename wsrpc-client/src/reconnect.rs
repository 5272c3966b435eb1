//! Reconnection policy
//!
//! After an unexpected transport close the connection manager asks the
//! strategy for the delay before the next attempt, passing the number of
//! reconnect attempts made since the last successful open. `None` means give
//! up: the connection settles into CLOSED.
//!
//! # Built-in Strategies
//!
//! - **FixedDelay**: constant delay, bounded attempts. The default, built from
//!   `reconnectDelay` and `maxReconnectAttempts`
//! - **ExponentialBackoff**: doubling delays with an optional cap and jitter
//! - **NoReconnect**: every unexpected close is final
//!
//! # Examples
//!
//! ```rust
//! use wsrpc_client::{FixedDelay, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut strategy = FixedDelay::new(Duration::from_millis(3000)).with_max_attempts(10);
//! assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(3000)));
//! assert_eq!(strategy.next_delay(10), None);
//! ```

use std::time::Duration;

/// Decides whether and when to reconnect after an unexpected close
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next reconnect attempt
    ///
    /// `attempt` counts reconnect attempts since the last successful open,
    /// starting at 0. Returns `None` to stop reconnecting.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Called on every successful open and every explicit close
    fn reset(&mut self);
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Unbounded attempts, `delay` apart
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up once `max_attempts` reconnects were made without an open
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {}
}

/// Exponential backoff with optional jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    last_attempt: u32,
}

impl ExponentialBackoff {
    /// `min_delay * 2^attempt`, capped at `max_delay`
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            last_attempt: 0,
        }
    }

    /// Give up once `max_attempts` reconnects were made without an open
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random jitter to each delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.last_attempt = attempt;

        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let base = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        let delay = base.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            use rand::Rng;
            let jitter_ms = rand::thread_rng().gen_range(0..=(delay / 4));
            return Some(Duration::from_millis(delay + jitter_ms));
        }

        Some(Duration::from_millis(delay))
    }

    fn reset(&mut self) {
        self.last_attempt = 0;
    }
}

/// Never reconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
