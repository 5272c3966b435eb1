//! Error types for wsrpc
//!
//! Two kinds of error live here:
//!
//! - **Error**: everything a caller of the client can observe (uses thiserror)
//! - **JsonRpcErrorData**: the standard `{code, message, data}` error object
//!
//! # What Gets Surfaced
//!
//! Only conditions tied to one in-flight request ever reach a caller:
//! a send refused because the socket is not open, an id collision, a timeout,
//! a remote `error` reply, or the connection settling into CLOSED while the
//! request was pending. Malformed inbound frames, refused connect attempts and
//! transport errors are absorbed at the boundary and only logged.
//!
//! # Examples
//!
//! ```rust
//! use wsrpc_core::{Error, JsonRpcErrorData};
//! use serde_json::json;
//!
//! let error = Error::Remote(json!({"code": -32601, "message": "Method not found"}));
//! let data = error.rpc_error_data().unwrap();
//! assert_eq!(data.code, JsonRpcErrorData::method_not_found("x").code);
//! ```

use crate::types::Id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for wsrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for wsrpc operations
///
/// # Error Categories
///
/// - **Request rejections**: NotOpen, RepeatRequest
/// - **Request outcomes**: Timeout, Remote, ConnectionClosed
/// - **Framing**: Serialization, JsonRpc, EmptyFrame
/// - **Setup**: InvalidConfig, WebSocket, Internal
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The transport was not OPEN when a request had to be sent.
    /// Nothing was written to the socket.
    #[error("socket not open")]
    NotOpen,

    /// A request with the same id is still waiting for its reply.
    ///
    /// Only reachable after the id counter wrapped around, or when a frame
    /// mutator rewrote the id.
    #[error("repeat request: id {0}")]
    RepeatRequest(Id),

    /// No reply arrived within the request's timeout window
    #[error("request timeout: {method}")]
    Timeout {
        /// Method name of the request that timed out
        method: String,
    },

    /// The remote peer replied with an `error` member
    ///
    /// The payload is kept verbatim; use [`Error::rpc_error_data`] to read it
    /// as a standard error object.
    #[error("remote error: {0}")]
    Remote(serde_json::Value),

    /// The connection settled into CLOSED while the request was pending
    #[error("connection closed")]
    ConnectionClosed,

    /// Wire-format error object, typically produced by the codec
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// Serialization or deserialization error
    ///
    /// Occurs when converting between Rust types and JSON. Usually indicates
    /// a mismatch between expected and actual data structures.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound frame carried no payload at all
    #[error("empty frame")]
    EmptyFrame,

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The client configuration was rejected at build time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An unexpected internal failure, such as a dropped reply channel
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Read a [`Error::Remote`] payload as a standard JSON-RPC error object
    ///
    /// Returns `None` for every other variant, and for remote payloads that
    /// don't have the `{code, message}` shape.
    pub fn rpc_error_data(&self) -> Option<JsonRpcErrorData> {
        match self {
            Error::Remote(payload) => serde_json::from_value(payload.clone()).ok(),
            Error::JsonRpc(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// True for [`Error::Timeout`]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// JSON-RPC 2.0 error data
///
/// The standard error object: an integer `code`, a short `message` and an
/// optional `data` member.
///
/// # Standard Error Codes
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid Request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000 to -32099`: Server error (implementation-defined)
///
/// # Examples
///
/// ```rust
/// use wsrpc_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::method_not_found("calculate");
/// assert_eq!(error.code, -32601);
///
/// let custom = JsonRpcErrorData::with_data(
///     1001,
///     "Insufficient funds",
///     json!({"balance": 50, "required": 100})
/// );
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code indicating the error type
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create a new JSON-RPC error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    /// Create a method not found error (-32601)
    ///
    /// ```rust
    /// use wsrpc_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::method_not_found("calculateFoo");
    /// assert_eq!(error.message, "Method not found: calculateFoo");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: foo"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
