//! Client configuration
//!
//! [`ClientConfig`] holds the plain, serializable options. Option names on the
//! wire are camelCase (`maxReconnectAttempts`, `reconnectDelay`,
//! `requestTimeout`) and durations are integer milliseconds, so a config file
//! written for other clients of the same protocol loads unchanged.
//!
//! Lifecycle callbacks can't be serialized and live in
//! [`LifecycleCallbacks`], which the builder fills in.
//!
//! ```rust
//! use wsrpc_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::from_json(r#"{"url": "ws://h", "reconnectDelay": 100}"#).unwrap();
//! assert_eq!(config.reconnect_delay, Duration::from_millis(100));
//! assert_eq!(config.max_reconnect_attempts, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use wsrpc_core::{Error, Result};

/// Largest integer a JSON number holds without precision loss on every peer
pub const MAX_SAFE_REQUEST_ID: u64 = (1 << 53) - 1;

/// Highest `maxRequestId` accepted; request ids go on the wire as `i64`
pub const MAX_REQUEST_ID_CEILING: u64 = i64::MAX as u64;

/// Serializable client options
///
/// Immutable once handed to the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Server URL. Connect attempts with an empty URL are refused and logged.
    pub url: String,
    /// Reconnect attempts allowed between two successful opens
    pub max_reconnect_attempts: u32,
    /// Delay before each reconnect attempt
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
    /// Default per-request timeout
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Request ids run from 1 to this value, then wrap
    pub max_request_id: u64,
    /// Fail every pending request with `ConnectionClosed` when the
    /// connection settles into CLOSED
    pub reject_pending_on_close: bool,
    /// Verbosity of the default log sink, 0 (silent) to 3 (debug)
    pub log_level: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_millis(30000),
            max_request_id: MAX_SAFE_REQUEST_ID,
            reject_pending_on_close: true,
            log_level: 3,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON config document; absent options take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client can't run with
    ///
    /// An empty URL is not an error here; it is refused at connect time.
    pub fn validate(&self) -> Result<()> {
        if self.max_request_id == 0 {
            return Err(Error::InvalidConfig(
                "maxRequestId must be at least 1".to_string(),
            ));
        }
        if self.max_request_id > MAX_REQUEST_ID_CEILING {
            return Err(Error::InvalidConfig(format!(
                "maxRequestId must not exceed {}",
                MAX_REQUEST_ID_CEILING
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "requestTimeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// No-argument lifecycle callback
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired on connection status transitions
///
/// `on_open`, `on_close` and `on_connecting` fire only when the status
/// actually changes. `on_error` fires on every transport error event.
#[derive(Clone, Default)]
pub struct LifecycleCallbacks {
    /// Status became OPEN
    pub on_open: Option<Callback>,
    /// Status became CLOSED
    pub on_close: Option<Callback>,
    /// The transport reported an error
    pub on_error: Option<Callback>,
    /// Status became CONNECTING
    pub on_connecting: Option<Callback>,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
