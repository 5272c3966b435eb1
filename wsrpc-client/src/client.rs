//! JSON-RPC client over an auto-reconnecting WebSocket
//!
//! [`SocketRpc`] ties the connection lifecycle to request correlation:
//! transport events are read by one task per transport and handled in
//! order, replies settle pending requests, and notifications go to their
//! registered handlers.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: `ClientBuilder::build()` returns a CLOSED client
//! 2. **Open**: `open()` starts connecting; `ClientBuilder::connect()` does
//!    both steps
//! 3. **Use**: requests and notifications while OPEN
//! 4. **Reconnect**: unexpected closes are retried per the strategy
//! 5. **Close**: `close()` stops everything; `open()` may start again
//!
//! # Cloning
//!
//! `SocketRpc` is a cheap `Arc` handle. All clones share one connection.
//! Background tasks hold weak references, so dropping the last clone closes
//! the socket and stops reconnecting.

use crate::client_builder::ClientBuilder;
use crate::connection_state::{Connection, ConnectionManager, ConnectionStatus};
use crate::request::{Correlator, FrameMutator};
use crate::transport::{Transport, TransportEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use wsrpc_core::{Error, InboundEnvelope, LogSink, Result};

pub(crate) struct ClientInner {
    connection: ConnectionManager,
    correlator: Arc<Correlator>,
    reject_pending_on_close: bool,
    log: Arc<dyn LogSink>,
}

impl ClientInner {
    fn connect(self: &Arc<Self>) {
        if let Some(connection) = self.connection.connect() {
            tokio::spawn(Self::dispatch(Arc::downgrade(self), connection));
        }
    }

    /// Feed one transport's events to the client until the transport ends
    async fn dispatch(client: Weak<Self>, mut connection: Connection) {
        while let Some(event) = connection.events.recv().await {
            let Some(client) = client.upgrade() else {
                break;
            };
            client.handle_event(connection.generation, event);
        }
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                self.connection.handle_open(generation);
            }
            TransportEvent::Error(error) => self.connection.handle_error(generation, &error),
            TransportEvent::Close { code, reason } => {
                let client = Arc::downgrade(self);
                let changed = self
                    .connection
                    .handle_close(generation, code, &reason, move |delay| {
                        tokio::spawn(Self::reconnect_after(client, delay))
                    });
                self.settled(changed);
            }
            TransportEvent::Message(text) => {
                if !self.connection.is_current(generation) {
                    self.log.debug("message from a replaced transport", &generation);
                }
                self.correlator.handle_message(&text);
            }
        }
    }

    async fn reconnect_after(client: Weak<Self>, delay: Duration) {
        tokio::time::sleep(delay).await;
        if let Some(client) = client.upgrade() {
            if client.connection.reconnect_due() {
                client.connect();
            }
        }
    }

    fn settled(&self, changed: Option<ConnectionStatus>) {
        if changed == Some(ConnectionStatus::Closed) && self.reject_pending_on_close {
            self.correlator.reject_all(Error::ConnectionClosed);
        }
    }
}

/// JSON-RPC 2.0 client over WebSocket
///
/// Created through [`ClientBuilder`]. Every method that starts connecting
/// (`open`, and `ClientBuilder::connect`) must be called inside a tokio
/// runtime.
#[derive(Clone)]
pub struct SocketRpc {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for SocketRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketRpc")
            .field("url", &self.inner.connection.url())
            .field("status", &self.status())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl SocketRpc {
    pub(crate) fn from_parts(
        connection: ConnectionManager,
        correlator: Arc<Correlator>,
        reject_pending_on_close: bool,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connection,
                correlator,
                reject_pending_on_close,
                log,
            }),
        }
    }

    /// Start configuring a client for `url`
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// Start connecting
    ///
    /// Only valid while CLOSED; otherwise an error is logged and nothing
    /// happens. Clears the effect of a previous `close()`.
    pub fn open(&self) {
        if self.inner.connection.reopen() {
            self.inner.connect();
        }
    }

    /// Close the connection and stop reconnecting
    ///
    /// Idempotent. Cancels a scheduled reconnect and resets the attempt
    /// counter. The status reaches CLOSED once the transport's close event
    /// arrives, or immediately when there is no live transport.
    pub fn close(&self) {
        let changed = self.inner.connection.close();
        self.inner.settled(changed);
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        self.inner.connection.status()
    }

    /// Whether the status is OPEN
    pub fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    /// Subscribe to status changes
    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.connection.subscribe()
    }

    /// Wait until the status equals `status`
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> Result<()> {
        let mut changes = self.status_changes();
        changes
            .wait_for(|current| *current == status)
            .await
            .map(|_| ())
            .map_err(|_| Error::Internal("status channel closed".to_string()))
    }

    /// Reconnect attempts since the last successful open or explicit close
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.connection.reconnect_attempts()
    }

    /// Requests waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// The current transport, if one was ever created
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner.connection.transport()
    }

    /// Server URL
    pub fn url(&self) -> &str {
        self.inner.connection.url()
    }

    /// Send a request and wait for its settlement
    ///
    /// `timeout` defaults to the configured request timeout. `mutator` may
    /// rewrite the frame before it is sent, including its id.
    ///
    /// # Errors
    ///
    /// - [`Error::RepeatRequest`] if the id is still pending
    /// - [`Error::NotOpen`] if the transport is not open; nothing is sent
    /// - [`Error::Timeout`] if no reply arrived in time
    /// - [`Error::Remote`] with the reply's `error` member
    /// - [`Error::ConnectionClosed`] if the connection settled into CLOSED first
    #[tracing::instrument(skip_all, fields(method = %method.as_ref()))]
    pub async fn send_request(
        &self,
        method: impl Into<String> + AsRef<str>,
        params: Option<Value>,
        timeout: Option<Duration>,
        mutator: Option<FrameMutator>,
    ) -> Result<Value> {
        let rx = self.inner.correlator.begin_request(
            self.inner.connection.transport(),
            method.into(),
            params,
            timeout,
            mutator,
        )?;

        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Send a request with serializable params and the default timeout
    ///
    /// Params serializing to `null` (such as `()`) are omitted from the frame.
    pub async fn request<P>(&self, method: impl Into<String> + AsRef<str>, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        let params = params_value(params)?;
        self.send_request(method, params, None, None).await
    }

    /// Like [`request`](Self::request), deserializing the result
    pub async fn request_as<P, R>(&self, method: impl Into<String> + AsRef<str>, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Send a notification if OPEN; dropped silently otherwise
    pub fn send_notification(&self, method: impl Into<String>, params: Option<Value>) {
        self.inner
            .correlator
            .send_notification(self.inner.connection.transport(), method.into(), params);
    }

    /// Send a notification with serializable params
    pub fn notify<P>(&self, method: impl Into<String>, params: P)
    where
        P: Serialize,
    {
        let method = method.into();
        match params_value(params) {
            Ok(params) => self.send_notification(method, params),
            Err(e) => self.inner.log.error("notification params not serializable", &(method, e)),
        }
    }

    /// Register a handler for server notifications named `method`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `method` is empty.
    pub fn on_notification<F>(&self, method: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        self.inner.correlator.notifications().register(method, handler)
    }

    /// Remove the handler for `method`
    pub fn remove_notification(&self, method: &str) -> bool {
        self.inner.correlator.notifications().unregister(method)
    }
}

fn params_value<P: Serialize>(params: P) -> Result<Option<Value>> {
    let value = serde_json::to_value(params).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConnector;
    use crate::{ClientBuilder, FixedDelay};
    use serde_json::json;
    use wsrpc_core::NoopSink;

    fn client(connector: Arc<FakeConnector>) -> SocketRpc {
        ClientBuilder::new("ws://fake")
            .log_sink(Arc::new(NoopSink))
            .with_connector(connector)
            .with_reconnect(Box::new(
                FixedDelay::new(Duration::from_millis(100)).with_max_attempts(2),
            ))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let connector = Arc::new(FakeConnector::default());
        let client = client(connector.clone());

        client.open();
        connector.latest().unwrap().open();
        client.wait_for_status(ConnectionStatus::Open).await.unwrap();

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request("add", json!([5, 3])).await }
        });

        while connector.latest().unwrap().sent().is_empty() {
            tokio::task::yield_now().await;
        }
        connector
            .latest()
            .unwrap()
            .deliver(r#"{"jsonrpc":"2.0","result":8,"id":1}"#);

        assert_eq!(pending.await.unwrap().unwrap(), json!(8));
    }

    #[tokio::test]
    async fn test_request_before_open() {
        let connector = Arc::new(FakeConnector::default());
        let client = client(connector);

        assert!(matches!(client.request("x", ()).await, Err(Error::NotOpen)));
    }

    #[tokio::test]
    async fn test_close_rejects_pending() {
        let connector = Arc::new(FakeConnector::default());
        let client = client(connector.clone());

        client.open();
        connector.latest().unwrap().open();
        client.wait_for_status(ConnectionStatus::Open).await.unwrap();

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request("slow", ()).await }
        });
        while client.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        client.close();
        assert!(matches!(pending.await.unwrap(), Err(Error::ConnectionClosed)));
        assert_eq!(client.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn test_params_value() {
        assert_eq!(params_value(()).unwrap(), None);
        assert_eq!(params_value(json!({"a": 1})).unwrap(), Some(json!({"a": 1})));
        assert_eq!(params_value(vec![1, 2]).unwrap(), Some(json!([1, 2])));
    }
}
