//! Injectable diagnostic sink
//!
//! The client never logs through global state. A [`LogSink`] is handed to it at
//! construction and every diagnostic goes through that sink. The default sink,
//! [`TracingSink`], forwards to the `tracing` macros under the `wsrpc` target
//! and filters by a numeric [`Verbosity`]:
//!
//! | level | output                |
//! |-------|-----------------------|
//! | 0     | nothing               |
//! | 1     | error                 |
//! | 2     | error, warn           |
//! | 3     | error, warn, debug    |
//!
//! Logging has no effect on behavior; a sink that drops everything is as
//! correct as one that records everything.
//!
//! # Examples
//!
//! ```rust
//! use wsrpc_core::log::{LogSink, TracingSink, Verbosity};
//!
//! let sink = TracingSink::new(Verbosity::from(2));
//! sink.warn("ignore message", &"{\"foo\":1}");
//! sink.debug("dropped by verbosity 2", &());
//! ```

use std::fmt::Debug;

/// Leveled diagnostic sink
///
/// `detail` carries the context of the message (an event, a frame, an
/// error). Implementations decide how to render it.
pub trait LogSink: Send + Sync {
    /// Fine-grained lifecycle and traffic diagnostics
    fn debug(&self, msg: &str, detail: &dyn Debug);

    /// Dropped or unexpected input
    fn warn(&self, msg: &str, detail: &dyn Debug);

    /// Refused operations and transport failures
    fn error(&self, msg: &str, detail: &dyn Debug);
}

/// Cumulative verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Nothing is emitted
    Silent = 0,
    /// Errors only
    Error = 1,
    /// Errors and warnings
    Warn = 2,
    /// Everything
    #[default]
    Debug = 3,
}

impl From<u8> for Verbosity {
    /// Levels above 3 clamp to [`Verbosity::Debug`]
    fn from(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Error,
            2 => Verbosity::Warn,
            _ => Verbosity::Debug,
        }
    }
}

impl Verbosity {
    /// Whether messages of `level` pass this verbosity
    pub fn enables(self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self >= level
    }
}

/// Sink forwarding to `tracing`, filtered by [`Verbosity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    verbosity: Verbosity,
}

impl TracingSink {
    /// Create a sink with the given verbosity
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// The configured verbosity
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl LogSink for TracingSink {
    fn debug(&self, msg: &str, detail: &dyn Debug) {
        if self.verbosity.enables(Verbosity::Debug) {
            tracing::debug!(target: "wsrpc", detail = ?detail, "{}", msg);
        }
    }

    fn warn(&self, msg: &str, detail: &dyn Debug) {
        if self.verbosity.enables(Verbosity::Warn) {
            tracing::warn!(target: "wsrpc", detail = ?detail, "{}", msg);
        }
    }

    fn error(&self, msg: &str, detail: &dyn Debug) {
        if self.verbosity.enables(Verbosity::Error) {
            tracing::error!(target: "wsrpc", detail = ?detail, "{}", msg);
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn debug(&self, _msg: &str, _detail: &dyn Debug) {}
    fn warn(&self, _msg: &str, _detail: &dyn Debug) {}
    fn error(&self, _msg: &str, _detail: &dyn Debug) {}
}
