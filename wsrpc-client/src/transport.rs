//! Message transport
//!
//! The client talks to the network through two small traits:
//!
//! - [`Connector`] creates a fresh [`Transport`] for a URL and wires its
//!   lifecycle events into an unbounded channel
//! - [`Transport`] reports its [`ReadyState`], sends text frames and closes
//!
//! Each transport emits, in order: at most one [`TransportEvent::Open`], any
//! number of `Message` and `Error` events, and exactly one terminal
//! [`TransportEvent::Close`]. A transport is never reused; reconnecting
//! creates a new one.
//!
//! [`WsConnector`] is the default and runs each connection on its own tokio
//! task using `tokio-tungstenite`.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wsrpc_core::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a locally initiated close waits for the peer's close frame
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Readiness of a single transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress
    Connecting = 0,
    /// Frames can be sent
    Open = 1,
    /// Close requested, waiting for the close handshake
    Closing = 2,
    /// Done; no further events besides the terminal close
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    /// Open or still connecting
    pub fn is_active(self) -> bool {
        matches!(self, ReadyState::Connecting | ReadyState::Open)
    }
}

/// Lifecycle event emitted by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed
    Open,
    /// Connection ended; always the last event
    Close {
        /// Close code from the peer's close frame, if one was received
        code: Option<u16>,
        /// Close reason from the peer's close frame
        reason: String,
    },
    /// Handshake or I/O failure; a `Close` follows
    Error(String),
    /// Inbound text frame
    Message(String),
}

/// A single connection attempt and, if it succeeds, the open socket
pub trait Transport: Send + Sync {
    /// Current readiness
    fn ready_state(&self) -> ReadyState;

    /// Send one text frame
    ///
    /// Fails with [`Error::NotOpen`] unless the state is [`ReadyState::Open`].
    fn send(&self, text: String) -> Result<()>;

    /// Begin closing; a no-op once closing or closed
    fn close(&self);
}

/// Factory for transports
pub trait Connector: Send + Sync {
    /// Start connecting to `url`, delivering lifecycle events to `events`
    ///
    /// Must not block. Failures are reported as `Error` then `Close` events
    /// rather than returned.
    fn connect(&self, url: &str, events: mpsc::UnboundedSender<TransportEvent>) -> Arc<dyn Transport>;
}

enum Command {
    Send(String),
    Close,
}

/// WebSocket transport backed by `tokio-tungstenite`
pub struct WsTransport {
    state: Arc<AtomicU8>,
    commands: mpsc::UnboundedSender<Command>,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("state", &self.ready_state())
            .finish()
    }
}

impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&self, text: String) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        self.commands
            .send(Command::Send(text))
            .map_err(|_| Error::WebSocket("connection task has stopped".to_string()))
    }

    fn close(&self) {
        let current = self.ready_state();
        if !current.is_active() {
            return;
        }
        let _ = self.state.compare_exchange(
            current as u8,
            ReadyState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.commands.send(Command::Close);
    }
}

/// Default [`Connector`] opening real WebSocket connections
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str, events: mpsc::UnboundedSender<TransportEvent>) -> Arc<dyn Transport> {
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (commands, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_connection(
            url.to_string(),
            Arc::clone(&state),
            command_rx,
            events,
        ));

        Arc::new(WsTransport { state, commands })
    }
}

#[tracing::instrument(skip_all, fields(url = %url))]
async fn run_connection(
    url: String,
    state: Arc<AtomicU8>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let handshake = connect_async(url.as_str());
    tokio::pin!(handshake);

    let stream = tokio::select! {
        result = &mut handshake => match result {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket handshake failed");
                state.store(ReadyState::Closed as u8, Ordering::Release);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                let _ = events.send(TransportEvent::Close { code: None, reason: String::new() });
                return;
            }
        },
        _ = close_requested(&mut commands) => {
            tracing::debug!("Close requested before the handshake completed");
            state.store(ReadyState::Closed as u8, Ordering::Release);
            let _ = events.send(TransportEvent::Close { code: None, reason: String::new() });
            return;
        }
    };

    // close() may have landed between the handshake and here
    if state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        let (mut sink, _) = stream.split();
        let _ = sink.close().await;
        state.store(ReadyState::Closed as u8, Ordering::Release);
        let _ = events.send(TransportEvent::Close { code: None, reason: String::new() });
        return;
    }

    let _ = events.send(TransportEvent::Open);

    let (mut sink, mut source) = stream.split();
    let (code, reason) = pump(&state, &mut sink, &mut source, &mut commands, &events).await;

    let _ = sink.close().await;
    state.store(ReadyState::Closed as u8, Ordering::Release);
    let _ = events.send(TransportEvent::Close { code, reason });
}

/// Shuttle frames until either side closes; returns the peer's close code and reason
async fn pump(
    state: &AtomicU8,
    sink: &mut SplitSink<WsStream, Message>,
    source: &mut SplitStream<WsStream>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> (Option<u16>, String) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return (None, String::new());
                    }
                }
                Some(Command::Close) | None => {
                    state.store(ReadyState::Closing as u8, Ordering::Release);
                    if sink.send(Message::Close(None)).await.is_err() {
                        return (None, String::new());
                    }
                    return tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain(source, events))
                        .await
                        .unwrap_or((None, String::new()));
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Close(frame))) => {
                    state.store(ReadyState::Closing as u8, Ordering::Release);
                    return match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                }
                Some(Ok(message)) => {
                    if let Some(text) = inbound_text(message) {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                }
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return (None, String::new());
                }
                None => return (None, String::new()),
            }
        }
    }
}

/// Read until the peer's close frame, still delivering data frames
async fn drain(
    source: &mut SplitStream<WsStream>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> (Option<u16>, String) {
    while let Some(Ok(frame)) = source.next().await {
        match frame {
            Message::Close(Some(frame)) => {
                return (Some(u16::from(frame.code)), frame.reason.into_owned());
            }
            Message::Close(None) => break,
            message => {
                if let Some(text) = inbound_text(message) {
                    let _ = events.send(TransportEvent::Message(text));
                }
            }
        }
    }
    (None, String::new())
}

/// Payload of a data frame as text; binary frames are decoded lossily
///
/// Control frames yield `None`; ping/pong are answered by tungstenite.
fn inbound_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        _ => None,
    }
}

/// Resolves on a `Close` command or when every command sender is gone
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}
