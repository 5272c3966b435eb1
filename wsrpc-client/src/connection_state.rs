//! Connection lifecycle
//!
//! The [`ConnectionManager`] owns the current transport and the client-level
//! [`ConnectionStatus`], and decides what happens when a transport opens or
//! closes.
//!
//! # State Transitions
//!
//! ```text
//!            open()               transport open
//! CLOSED ───────────► CONNECTING ───────────────► OPEN
//!   ▲                  │  ▲                         │
//!   │  attempts spent  │  │ reconnect timer         │ transport close
//!   │  or close()      │  │                         │
//!   └──────────────────┘  └─────────────────────────┘
//! ```
//!
//! # Reconnection Logic
//!
//! On a transport close that the caller did not ask for:
//! 1. Ask the [`ReconnectionStrategy`] for a delay, passing the attempt counter
//! 2. `Some(delay)`: stay CONNECTING and arm the reconnect timer
//! 3. `None`: settle into CLOSED
//! 4. When the timer fires and no `close()` happened meanwhile, bump the
//!    counter and connect again
//!
//! The counter resets on every successful open and every explicit `close()`.
//!
//! Status changes are published to a `watch` channel under the state lock,
//! then the matching lifecycle callback runs after the lock is released, so
//! callbacks may call back into the client.

use crate::config::LifecycleCallbacks;
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectionStrategy;
use crate::transport::{Connector, ReadyState, Transport, TransportEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use wsrpc_core::LogSink;

/// Client-level connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Waiting for a transport to open, including between reconnect attempts
    Connecting,
    /// A transport is open
    Open,
    /// Idle; only `open()` leaves this state
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Open => "OPEN",
            ConnectionStatus::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Handle to the events of the transport created by one connect call
pub(crate) struct Connection {
    pub(crate) generation: u64,
    pub(crate) events: mpsc::UnboundedReceiver<TransportEvent>,
}

struct ConnectionState {
    status: ConnectionStatus,
    transport: Option<Arc<dyn Transport>>,
    /// Bumped per transport so events from replaced transports are ignored
    generation: u64,
    reconnect_attempts: u32,
    user_closed: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    strategy: Box<dyn ReconnectionStrategy>,
}

pub(crate) struct ConnectionManager {
    url: String,
    connector: Arc<dyn Connector>,
    callbacks: LifecycleCallbacks,
    log: Arc<dyn LogSink>,
    metrics: Option<Arc<ClientMetrics>>,
    status_tx: watch::Sender<ConnectionStatus>,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub(crate) fn new(
        url: String,
        connector: Arc<dyn Connector>,
        strategy: Box<dyn ReconnectionStrategy>,
        callbacks: LifecycleCallbacks,
        log: Arc<dyn LogSink>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Closed);
        Self {
            url,
            connector,
            callbacks,
            log,
            metrics,
            status_tx,
            state: Mutex::new(ConnectionState {
                status: ConnectionStatus::Closed,
                transport: None,
                generation: 0,
                reconnect_attempts: 0,
                user_closed: false,
                reconnect_timer: None,
                strategy,
            }),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.state.lock().reconnect_attempts
    }

    pub(crate) fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.state.lock().transport.clone()
    }

    /// Clear the close flag if the client is idle
    ///
    /// Returns false, with an error logged, unless the status is CLOSED.
    pub(crate) fn reopen(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Closed {
            let status = state.status;
            drop(state);
            self.log.error("socket is not closed", &status);
            return false;
        }
        state.user_closed = false;
        true
    }

    /// Create a transport unless one is already open or connecting
    ///
    /// Refused after `close()` until `reopen()`, which covers a reconnect
    /// timer that fired just before the close landed.
    pub(crate) fn connect(&self) -> Option<Connection> {
        if self.url.is_empty() {
            self.log.error("url cannot be empty", &self.url);
            return None;
        }

        let mut state = self.state.lock();
        if state.user_closed {
            drop(state);
            self.log.debug("connect cancelled by close", &self.url);
            return None;
        }
        if let Some(existing) = &state.transport {
            let ready = existing.ready_state();
            if ready.is_active() {
                drop(state);
                self.log.error("socket connection already exists", &ready);
                return None;
            }
        }

        let changed = self.set_status(&mut state, ConnectionStatus::Connecting);

        let (tx, events) = mpsc::unbounded_channel();
        state.transport = Some(self.connector.connect(&self.url, tx));
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        self.log.debug("connecting", &self.url);
        self.announce(changed);
        Some(Connection { generation, events })
    }

    /// Caller-initiated close
    ///
    /// Returns the new status if this call settled the connection.
    pub(crate) fn close(&self) -> Option<ConnectionStatus> {
        let mut state = self.state.lock();
        state.user_closed = true;
        state.reconnect_attempts = 0;
        state.strategy.reset();
        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }

        let ready = state.transport.as_ref().map(|t| t.ready_state());
        let changed = match ready {
            Some(ReadyState::Connecting) | Some(ReadyState::Open) => {
                if let Some(transport) = &state.transport {
                    transport.close();
                }
                // the transport's close event settles the status
                None
            }
            Some(ReadyState::Closing) => None,
            Some(ReadyState::Closed) | None => self.set_status(&mut state, ConnectionStatus::Closed),
        };
        drop(state);

        self.log.debug("close requested", &ready);
        self.announce(changed)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    pub(crate) fn handle_open(&self, generation: u64) -> Option<ConnectionStatus> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        state.reconnect_attempts = 0;
        state.strategy.reset();
        let changed = self.set_status(&mut state, ConnectionStatus::Open);
        drop(state);

        self.log.debug("ws open", &self.url);
        self.announce(changed)
    }

    pub(crate) fn handle_error(&self, generation: u64, error: &str) {
        if !self.is_current(generation) {
            return;
        }
        self.log.debug("ws error", &error);
        if let Some(on_error) = &self.callbacks.on_error {
            on_error();
        }
    }

    /// React to the current transport closing
    ///
    /// `schedule` arms the reconnect timer and runs under the state lock, so
    /// a concurrent `close()` always sees the timer it has to cancel.
    pub(crate) fn handle_close<F>(
        &self,
        generation: u64,
        code: Option<u16>,
        reason: &str,
        schedule: F,
    ) -> Option<ConnectionStatus>
    where
        F: FnOnce(Duration) -> JoinHandle<()>,
    {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }

        let attempt = state.reconnect_attempts;
        let delay = if state.user_closed {
            None
        } else {
            state.strategy.next_delay(attempt)
        };

        let changed = match delay {
            Some(delay) => {
                let changed = self.set_status(&mut state, ConnectionStatus::Connecting);
                state.reconnect_timer = Some(schedule(delay));
                changed
            }
            None => self.set_status(&mut state, ConnectionStatus::Closed),
        };
        let user_closed = state.user_closed;
        drop(state);

        self.log.debug("ws close", &(code, reason));
        if let Some(delay) = delay {
            self.log.debug("reconnecting", &(attempt + 1, delay));
        } else if !user_closed {
            self.log.warn("reconnect attempts exhausted", &attempt);
        }
        self.announce(changed)
    }

    /// Called when the reconnect timer fires
    ///
    /// Returns true, with the attempt counter bumped, if the caller should
    /// connect again.
    pub(crate) fn reconnect_due(&self) -> bool {
        let mut state = self.state.lock();
        state.reconnect_timer = None;
        if state.user_closed {
            return false;
        }
        state.reconnect_attempts += 1;
        drop(state);

        if let Some(metrics) = &self.metrics {
            metrics.record_reconnect_attempt();
        }
        true
    }

    fn set_status(&self, state: &mut ConnectionState, status: ConnectionStatus) -> Option<ConnectionStatus> {
        if state.status == status {
            return None;
        }
        state.status = status;
        self.status_tx.send_replace(status);
        Some(status)
    }

    /// Runs outside the state lock
    fn announce(&self, changed: Option<ConnectionStatus>) -> Option<ConnectionStatus> {
        let status = changed?;

        self.log.debug("status", &status);
        if let Some(metrics) = &self.metrics {
            metrics.record_status(status);
        }

        let callback = match status {
            ConnectionStatus::Open => &self.callbacks.on_open,
            ConnectionStatus::Closed => &self.callbacks.on_close,
            ConnectionStatus::Connecting => &self.callbacks.on_connecting,
        };
        if let Some(callback) = callback {
            callback();
        }
        changed
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(transport) = state.transport.take() {
            transport.close();
        }
    }
}
