//! Scripted transport for unit tests

use crate::transport::{Connector, ReadyState, Transport, TransportEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use wsrpc_core::{Error, Result};

pub(crate) struct FakeTransport {
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl FakeTransport {
    pub(crate) fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Already-open transport with its event receiver
    pub(crate) fn open_pair() -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self::new(tx);
        *transport.state.lock() = ReadyState::Open;
        (transport, rx)
    }

    pub(crate) fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        let _ = self.events.send(TransportEvent::Open);
    }

    pub(crate) fn drop_connection(&self) {
        *self.state.lock() = ReadyState::Closed;
        let _ = self.events.send(TransportEvent::Close {
            code: Some(1006),
            reason: String::new(),
        });
    }

    pub(crate) fn deliver(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl Transport for FakeTransport {
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

#[derive(Default)]
pub(crate) struct FakeConnector {
    transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub(crate) fn latest(&self) -> Option<Arc<FakeTransport>> {
        self.transports.lock().last().cloned()
    }

    pub(crate) fn count(&self) -> usize {
        self.transports.lock().len()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _url: &str, events: mpsc::UnboundedSender<TransportEvent>) -> Arc<dyn Transport> {
        let transport = FakeTransport::new(events);
        self.transports.lock().push(Arc::clone(&transport));
        transport
    }
}
