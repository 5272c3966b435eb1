//! Common test utilities for wsrpc-client integration tests
//!
//! Two harnesses:
//! - [`MockWsServer`]: a real WebSocket server on localhost, driven by a
//!   handler that maps each inbound frame to zero or more outbound frames
//! - [`ScriptedConnector`]: an in-memory transport whose lifecycle the test
//!   drives directly, for tests running on paused time

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wsrpc_client::{Connector, ReadyState, Transport, TransportEvent};
use wsrpc_core::{Error, Result};

/// Maps one inbound text frame to the frames sent back
pub type Handler = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Mock WebSocket server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::UnboundedReceiver<String>,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Server answering with [`rpc_handler`]
    pub async fn new() -> Self {
        Self::with_handler(rpc_handler).await
    }

    /// Server with a custom frame handler
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::unbounded_channel::<String>();
        let peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>> = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_peers = Arc::clone(&peers);
        let accept_connections = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        // dropping the senders ends every connection task
                        accept_peers.lock().clear();
                        break;
                    }
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let (out_tx, out_rx) = mpsc::unbounded_channel();
                        accept_peers.lock().push(out_tx);
                        accept_connections.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(serve_connection(
                            stream,
                            Arc::clone(&handler),
                            msg_tx.clone(),
                            out_rx,
                        ));
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
            peers,
            connections,
        }
    }

    /// WebSocket URL of this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next text frame received from any client, or None after 5s
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next received frame, parsed
    pub async fn wait_for_json(&mut self) -> Option<Value> {
        let text = self.wait_for_message().await?;
        serde_json::from_str(&text).ok()
    }

    /// Push a text frame to every connected client
    pub fn broadcast(&self, text: impl Into<String>) {
        let text = text.into();
        for peer in self.peers.lock().iter() {
            let _ = peer.send(Message::Text(text.clone()));
        }
    }

    /// Close every current connection with a close frame; keep listening
    pub fn kick_all(&self) {
        for peer in self.peers.lock().drain(..) {
            let _ = peer.send(Message::Close(None));
        }
    }

    /// Stop accepting and drop every connection
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    handler: Handler,
    received: mpsc::UnboundedSender<String>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = received.send(text.clone());
                    for reply in handler(&text) {
                        if write.send(Message::Text(reply)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            pushed = outbound.recv() => match pushed {
                Some(Message::Close(frame)) => {
                    let _ = write.send(Message::Close(frame)).await;
                    break;
                }
                Some(message) => {
                    if write.send(message).await.is_err() {
                        return;
                    }
                }
                None => break,
            }
        }
    }
    let _ = write.close().await;
}

/// A small JSON-RPC server
///
/// - `add`: sums a numeric array
/// - `echo`: returns its params
/// - `echo_frame`: returns the whole request frame
/// - `fail`: replies with error `{code: -32000, message: "boom"}`
/// - `silent`: never replies
/// - `announce`: pushes a `news` notification carrying the params, then
///   replies `true`
/// - anything else: method not found
///
/// Frames without an id are not answered.
pub fn rpc_handler(text: &str) -> Vec<String> {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    let Some(id) = frame.get("id").cloned() else {
        return Vec::new();
    };
    let method = frame.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = frame.get("params").cloned().unwrap_or(Value::Null);

    match method {
        "add" => {
            let sum: i64 = params
                .as_array()
                .map(|xs| xs.iter().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            vec![mock_response(id, json!(sum))]
        }
        "echo" => vec![mock_response(id, params)],
        "echo_frame" => vec![mock_response(id, frame.clone())],
        "fail" => vec![mock_error_response(id, -32000, "boom")],
        "silent" => Vec::new(),
        "announce" => vec![mock_notification("news", params), mock_response(id, json!(true))],
        other => vec![mock_error_response(id, -32601, &format!("Method not found: {}", other))],
    }
}

/// A JSON-RPC success reply
pub fn mock_response(id: Value, result: Value) -> String {
    json!({"jsonrpc": "2.0", "result": result, "id": id}).to_string()
}

/// A JSON-RPC error reply
pub fn mock_error_response(id: Value, code: i32, message: &str) -> String {
    json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id}).to_string()
}

/// A JSON-RPC notification
pub fn mock_notification(method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "method": method, "params": params}).to_string()
}

/// Poll `condition` every 10ms for up to 5s
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// What a [`ScriptedConnector`] does with each new transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Fail the handshake: `Error` then `Close`
    Refuse,
    /// Open immediately
    Accept,
    /// Stay connecting until the test acts
    Hold,
}

/// In-memory transport driven by the test
pub struct ScriptedTransport {
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ScriptedTransport {
    /// Complete the handshake
    pub fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        let _ = self.events.send(TransportEvent::Open);
    }

    /// Lose the connection without a close frame
    pub fn drop_connection(&self) {
        *self.state.lock() = ReadyState::Closed;
        let _ = self.events.send(TransportEvent::Close {
            code: Some(1006),
            reason: String::new(),
        });
    }

    /// Deliver an inbound text frame
    pub fn deliver(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(text.into()));
    }

    /// Frames the client sent, parsed
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&self, text: String) -> Result<()> {
        if *self.state.lock() != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.is_active() {
            *state = ReadyState::Closed;
            let _ = self.events.send(TransportEvent::Close {
                code: Some(1000),
                reason: String::new(),
            });
        }
    }
}

/// Connector whose transports follow a [`Script`]
pub struct ScriptedConnector {
    script: Mutex<Script>,
    transports: Mutex<Vec<Arc<ScriptedTransport>>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            transports: Mutex::new(Vec::new()),
        })
    }

    /// Change what later transports do
    pub fn set_script(&self, script: Script) {
        *self.script.lock() = script;
    }

    /// Transports created so far
    pub fn connect_count(&self) -> usize {
        self.transports.lock().len()
    }

    /// Most recent transport
    pub fn latest(&self) -> Arc<ScriptedTransport> {
        self.transports.lock().last().cloned().expect("no transport created")
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _url: &str, events: mpsc::UnboundedSender<TransportEvent>) -> Arc<dyn Transport> {
        let transport = Arc::new(ScriptedTransport {
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            events,
        });
        self.transports.lock().push(Arc::clone(&transport));

        match *self.script.lock() {
            Script::Refuse => {
                *transport.state.lock() = ReadyState::Closed;
                let _ = transport.events.send(TransportEvent::Error("connection refused".into()));
                let _ = transport.events.send(TransportEvent::Close {
                    code: None,
                    reason: String::new(),
                });
            }
            Script::Accept => transport.open(),
            Script::Hold => {}
        }
        transport
    }
}

/// Counts how often a callback fired
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let count = Arc::clone(&self.0);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockWsServer::new().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        assert_eq!(server.connection_count(), 0);
        server.shutdown().await;
    }

    #[test]
    fn test_rpc_handler() {
        let replies = rpc_handler(r#"{"jsonrpc":"2.0","method":"add","params":[5,3],"id":1}"#);
        assert_eq!(replies.len(), 1);
        let reply: Value = serde_json::from_str(&replies[0]).unwrap();
        assert_eq!(reply["result"], json!(8));

        assert!(rpc_handler(r#"{"jsonrpc":"2.0","method":"add","params":[1]}"#).is_empty());
        assert!(rpc_handler(r#"{"jsonrpc":"2.0","method":"silent","id":2}"#).is_empty());
        assert_eq!(rpc_handler(r#"{"method":"announce","id":3}"#).len(), 2);
    }

    #[test]
    fn test_mock_notification_format() {
        let notification = mock_notification("event", json!({"data": "test"}));
        assert!(notification.contains("\"method\":\"event\""));
        assert!(!notification.contains("\"id\""));
    }
}
