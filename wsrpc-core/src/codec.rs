//! Codec for envelope serialization and deserialization
//!
//! Outbound envelopes are encoded to UTF-8 JSON text frames. Inbound text is
//! decoded leniently into an [`InboundEnvelope`]: the only hard requirement is
//! that the frame is a JSON object.
//!
//! # Error Mapping
//!
//! - Empty frame → `Error::EmptyFrame`
//! - Invalid JSON → `Error::JsonRpc` with `-32700` (Parse error)
//! - Valid JSON that isn't an object → `Error::JsonRpc` with `-32600`
//! - Encoding failures → `Error::Serialization`
//!
//! # Examples
//!
//! ```rust
//! use wsrpc_core::{codec, JsonRpcRequest, Id};
//!
//! let request = JsonRpcRequest::new("ping", None, Id::Number(1));
//! let json = codec::encode_request(&request).unwrap();
//!
//! let inbound = codec::decode_inbound(&json).unwrap();
//! assert_eq!(inbound.method(), Some("ping"));
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{InboundEnvelope, JsonRpcNotification, JsonRpcRequest};
use serde::{Deserialize, Serialize};

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a request envelope
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Encode a notification envelope
pub fn encode_notification(notif: &JsonRpcNotification) -> Result<String> {
    encode(notif)
}

/// Decode an inbound text frame
///
/// The `jsonrpc` member is not checked; any object shape is accepted and
/// routing is left to the caller.
///
/// ```rust
/// use wsrpc_core::{codec, Error};
///
/// assert!(matches!(codec::decode_inbound(""), Err(Error::EmptyFrame)));
/// assert!(codec::decode_inbound("not json").is_err());
/// assert!(codec::decode_inbound(r#"{"anything": 1}"#).is_ok());
/// ```
pub fn decode_inbound(data: &str) -> Result<InboundEnvelope> {
    if data.is_empty() {
        return Err(Error::EmptyFrame);
    }

    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|_e| Error::JsonRpc(JsonRpcErrorData::parse_error()))?;

    InboundEnvelope::new(value).ok_or_else(|| {
        Error::JsonRpc(JsonRpcErrorData::invalid_request(
            "Envelope must be a JSON object",
        ))
    })
}

/// Decode a JSON string directly to a specific type
///
/// ```rust
/// use wsrpc_core::{codec, JsonRpcRequest};
///
/// let json = r#"{"jsonrpc":"2.0","method":"test","id":1}"#;
/// let request: JsonRpcRequest = codec::decode_as(json).unwrap();
/// assert_eq!(request.method, "test");
/// ```
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}
