//! JSON-RPC 2.0 envelope types
//!
//! Three envelope shapes travel over the socket:
//!
//! 1. **Request**: `{"jsonrpc":"2.0","method":..,"params":..,"id":N}`, expects a reply
//! 2. **Notification**: the same without `id`, no reply expected
//! 3. **Reply** (inbound only): `result` or `error`, carrying the originating `id`
//!
//! Outbound envelopes are strongly typed. Inbound frames are read leniently
//! through [`InboundEnvelope`]: any JSON object is accepted and only the
//! presence of `id` and `method` decides how it is routed. The `jsonrpc`
//! member is never validated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Protocol version written into every outbound envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID
///
/// Serialized untagged, so `Id::Number(3)` goes on the wire as `3`.
/// Implements `Hash` and `Eq` so it can key the pending-request table.
///
/// # Examples
///
/// ```rust
/// use wsrpc_core::Id;
///
/// let id1: Id = "req-123".into();
/// let id2: Id = 42i64.into();
///
/// assert_eq!(id1.to_string(), "\"req-123\"");
/// assert_eq!(id2.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier, what the client allocates
    Number(i64),
    /// Null identifier; never treated as a reply id
    Null,
}

impl Id {
    /// Read an id from a raw JSON value
    ///
    /// Strings and integers map to their variants. Everything else,
    /// including floats, objects and `null`, maps to `Id::Null`.
    pub fn from_value(value: &Value) -> Id {
        match value {
            Value::String(s) => Id::String(s.clone()),
            Value::Number(n) => n.as_i64().map(Id::Number).unwrap_or(Id::Null),
            _ => Id::Null,
        }
    }

    /// True unless this is `Id::Null`
    pub fn is_present(&self) -> bool {
        !matches!(self, Id::Null)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    /// Saturates at `i64::MAX`; the client never allocates ids that large.
    fn from(n: u64) -> Self {
        Id::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// JSON-RPC 2.0 request envelope
///
/// `params` is left off the wire when it is `None`. Fields the type doesn't
/// know about can be added through `extra`; they are flattened into the
/// top-level object, which is what frame mutators use to attach extra
/// envelope members.
///
/// # Examples
///
/// ```rust
/// use wsrpc_core::{JsonRpcRequest, Id};
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new("subtract", Some(json!([42, 23])), Id::Number(1));
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0" when built with `new`
    pub jsonrpc: String,
    /// Name of the remote method to invoke
    pub method: String,
    /// Optional parameters to pass to the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Identifier correlating this request with its reply
    pub id: Id,
    /// Additional top-level members
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
            extra: Map::new(),
        }
    }

    /// Attach an extra top-level member to the envelope
    pub fn insert_extra(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }
}

/// JSON-RPC 2.0 notification envelope
///
/// Never carries an `id`, and the peer never replies to it.
///
/// ```rust
/// use wsrpc_core::JsonRpcNotification;
/// use serde_json::json;
///
/// let notif = JsonRpcNotification::new("status.update", Some(json!({"status": "online"})));
/// let text = serde_json::to_string(&notif).unwrap();
/// assert!(!text.contains("\"id\""));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol version
    pub jsonrpc: String,
    /// Name of the method/event being notified
    pub method: String,
    /// Optional parameters or event data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 reply envelope
///
/// The client only ever receives replies. This type exists so peers and tests
/// can build well-formed replies; the client itself reads replies through
/// [`InboundEnvelope`].
///
/// ```rust
/// use wsrpc_core::{JsonRpcResponse, Id};
/// use serde_json::json;
///
/// let reply = JsonRpcResponse::success(json!({"value": 42}), Id::Number(1));
/// assert!(reply.is_success());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version
    pub jsonrpc: String,
    /// Result of the call, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, present on failure. Any JSON value is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Id of the originating request
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a successful reply
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error reply carrying an arbitrary error payload
    pub fn error(error: Value, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Check if the reply represents a successful result
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if the reply represents an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A parsed inbound frame
///
/// Wraps the full JSON object exactly as it arrived. Routing only looks at
/// [`InboundEnvelope::id`] and [`InboundEnvelope::method`], both of which use
/// explicit presence checks: an `id` of `null` counts as absent, an `id` of
/// `0` counts as present.
///
/// ```rust
/// use wsrpc_core::{InboundEnvelope, Id};
/// use serde_json::json;
///
/// let env = InboundEnvelope::new(json!({"id": 3, "result": "ok"})).unwrap();
/// assert_eq!(env.id(), Some(Id::Number(3)));
/// assert!(env.method().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    value: Value,
}

impl InboundEnvelope {
    /// Wrap a JSON value, which must be an object
    pub fn new(value: Value) -> Option<Self> {
        if value.is_object() {
            Some(Self { value })
        } else {
            None
        }
    }

    /// Reply id, if the frame carries a non-null `id`
    pub fn id(&self) -> Option<Id> {
        self.value
            .get("id")
            .map(Id::from_value)
            .filter(Id::is_present)
    }

    /// Method name, if the frame carries a non-empty string `method`
    pub fn method(&self) -> Option<&str> {
        self.value
            .get("method")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// The `params` member
    pub fn params(&self) -> Option<&Value> {
        self.value.get("params")
    }

    /// The `result` member
    pub fn result(&self) -> Option<&Value> {
        self.value.get("result")
    }

    /// The `error` member
    pub fn error(&self) -> Option<&Value> {
        self.value.get("error")
    }

    /// True when the frame carries an `error` member
    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// The full parsed frame
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Consume the envelope, returning the full parsed frame
    pub fn into_value(self) -> Value {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = JsonRpcRequest::new("add", Some(json!({"a": 1})), Id::Number(5));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1}, "id": 5})
        );
    }

    #[test]
    fn test_request_without_params_omits_member() {
        let request = JsonRpcRequest::new("ping", None, Id::Number(1));
        let text = serde_json::to_string(&request).unwrap();
        assert!(!text.contains("params"));
    }

    #[test]
    fn test_request_extra_members_are_flattened() {
        let mut request = JsonRpcRequest::new("ping", None, Id::Number(1));
        request.insert_extra("token", json!("abc"));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["token"], "abc");
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_notification_has_no_id() {
        let notif = JsonRpcNotification::new("log", Some(json!(["x"])));
        let value = serde_json::to_value(&notif).unwrap();

        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "log", "params": ["x"]}));
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(Id::from_value(&json!(4)), Id::Number(4));
        assert_eq!(Id::from_value(&json!("a")), Id::String("a".into()));
        assert_eq!(Id::from_value(&json!(null)), Id::Null);
        assert_eq!(Id::from_value(&json!(1.5)), Id::Null);
        assert_eq!(Id::from_value(&json!({"x": 1})), Id::Null);
    }

    #[test]
    fn test_id_from_u64_saturates() {
        assert_eq!(Id::from(u64::MAX), Id::Number(i64::MAX));
        assert_eq!(Id::from(9u64), Id::Number(9));
    }

    #[test]
    fn test_envelope_rejects_non_objects() {
        assert!(InboundEnvelope::new(json!([1, 2])).is_none());
        assert!(InboundEnvelope::new(json!("text")).is_none());
        assert!(InboundEnvelope::new(json!(null)).is_none());
    }

    #[test]
    fn test_envelope_null_id_is_absent() {
        let env = InboundEnvelope::new(json!({"id": null, "method": "tick"})).unwrap();
        assert_eq!(env.id(), None);
        assert_eq!(env.method(), Some("tick"));
    }

    #[test]
    fn test_envelope_zero_id_is_present() {
        let env = InboundEnvelope::new(json!({"id": 0, "result": true})).unwrap();
        assert_eq!(env.id(), Some(Id::Number(0)));
    }

    #[test]
    fn test_envelope_empty_method_is_absent() {
        let env = InboundEnvelope::new(json!({"method": ""})).unwrap();
        assert!(env.method().is_none());
    }

    #[test]
    fn test_envelope_ignores_version_member() {
        let env = InboundEnvelope::new(json!({"jsonrpc": "1.0", "id": 2, "error": "nope"})).unwrap();
        assert_eq!(env.id(), Some(Id::Number(2)));
        assert!(env.is_error());
        assert_eq!(env.error(), Some(&json!("nope")));
    }

    #[test]
    fn test_response_constructors() {
        let ok = JsonRpcResponse::success(json!(1), Id::Number(1));
        assert!(ok.is_success());
        assert!(!ok.is_error());

        let err = JsonRpcResponse::error(json!({"code": 1}), Id::Number(2));
        assert!(err.is_error());
        let text = serde_json::to_string(&err).unwrap();
        assert!(!text.contains("result"));
    }
}
