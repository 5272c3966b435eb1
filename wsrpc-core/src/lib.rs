//! Core types for wsrpc
//!
//! This crate holds everything the client runtime and its callers share:
//!
//! - **Types**: request, notification and reply envelopes, plus the lenient
//!   [`InboundEnvelope`] used to route incoming frames
//! - **Codec**: encoding outbound envelopes, decoding inbound text frames
//! - **Error handling**: the [`Error`] taxonomy surfaced to callers
//! - **Logging**: the injectable [`log::LogSink`] capability
//! - **Observability**: OpenTelemetry and `tracing` subscriber setup
//!
//! # Example
//!
//! ```rust
//! use wsrpc_core::{codec, Id, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new("add", Some(serde_json::json!([5, 3])), Id::Number(1));
//! let text = codec::encode_request(&request).unwrap();
//!
//! let inbound = codec::decode_inbound(&text).unwrap();
//! assert_eq!(inbound.id(), Some(Id::Number(1)));
//! ```

pub mod codec;
pub mod error;
pub mod log;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use log::{LogSink, NoopSink, TracingSink, Verbosity};
pub use observability::{init_logging, init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Id, InboundEnvelope, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION,
};
