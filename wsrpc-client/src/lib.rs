//! JSON-RPC 2.0 client over an auto-reconnecting WebSocket
//!
//! This crate keeps one WebSocket connection alive and multiplexes
//! request/response calls and server notifications over it.
//!
//! # Core Features
//!
//! - **Request-Response**: calls correlated by id, each with its own timeout
//! - **Notifications**: fire-and-forget sends, and handlers for
//!   server-initiated messages
//! - **Auto-Reconnection**: fixed delay with bounded attempts by default,
//!   any [`ReconnectionStrategy`] on request
//! - **Lifecycle**: CONNECTING / OPEN / CLOSED status with callbacks and a
//!   `watch` channel
//! - **Pluggable transport**: [`Connector`] and [`Transport`] traits, with
//!   `tokio-tungstenite` as the default
//! - **Observability**: `tracing` diagnostics through an injectable log sink,
//!   optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wsrpc_client::{ClientBuilder, ConnectionStatus};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8080")
//!         .notification("events", |envelope| println!("event: {:?}", envelope.params()))
//!         .connect()?;
//!
//!     client.wait_for_status(ConnectionStatus::Open).await?;
//!
//!     let sum: i64 = client.request_as("add", json!([5, 3])).await?;
//!     println!("5 + 3 = {}", sum);
//!
//!     client.notify("log", json!({"msg": "hello"}));
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # With Backoff
//!
//! ```rust,no_run
//! use wsrpc_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> wsrpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .with_reconnect(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
//!             .with_max_attempts(10)
//!             .with_jitter(),
//!     ))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod client_builder;
mod config;
mod connection_state;
mod metrics;
mod notification;
mod reconnect;
mod request;
#[cfg(test)]
mod testing;
pub mod transport;

pub use client::SocketRpc;
pub use client_builder::ClientBuilder;
pub use config::{
    Callback, ClientConfig, LifecycleCallbacks, MAX_REQUEST_ID_CEILING, MAX_SAFE_REQUEST_ID,
};
pub use connection_state::ConnectionStatus;
pub use metrics::{ClientMetrics, RequestOutcome};
pub use notification::{NotificationFn, NotificationHandler};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use request::FrameMutator;
pub use transport::{Connector, ReadyState, Transport, TransportEvent, WsConnector};
