//! wsrpc - JSON-RPC 2.0 over an auto-reconnecting WebSocket
//!
//! Convenience crate re-exporting the wsrpc sub-crates:
//!
//! - **wsrpc-core**: JSON-RPC types, codec, errors, logging and observability
//! - **wsrpc-client**: the connection manager, request correlation and the
//!   [`SocketRpc`] client
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wsrpc::{ClientBuilder, ConnectionStatus};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> wsrpc::Result<()> {
//!     let client = ClientBuilder::new("ws://localhost:8080")
//!         .request_timeout(Duration::from_secs(5))
//!         .notification("ticker.update", |envelope| {
//!             println!("tick: {:?}", envelope.params());
//!         })
//!         .connect()?;
//!     client.wait_for_status(ConnectionStatus::Open).await?;
//!
//!     let sum = client.request("add", serde_json::json!([5, 3])).await?;
//!     println!("5 + 3 = {}", sum);
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

pub use wsrpc_client as client;
pub use wsrpc_core as core;

pub use wsrpc_client::{ClientBuilder, ClientConfig, ConnectionStatus, SocketRpc};
pub use wsrpc_core::{Error, Result};
