//! Request correlation
//!
//! The [`Correlator`] turns method calls into JSON-RPC request frames and
//! matches inbound replies back to their callers by id.
//!
//! # Request Lifecycle
//!
//! 1. **Allocate id**: pre-incremented counter, wrapping to 1 after the
//!    configured ceiling
//! 2. **Build frame**: `{jsonrpc, method, params, id}`, then the optional
//!    frame mutator may rewrite it (extra fields, a different id)
//! 3. **Check**: refuse an id that is still pending, refuse if the transport
//!    is not open
//! 4. **Register and send**: a oneshot channel per request
//! 5. **Arm timer**: on expiry the entry is removed and the caller gets
//!    [`Error::Timeout`] naming the method
//! 6. **Settle**: a reply with that id removes the entry, cancels the timer
//!    and resolves the caller with `result`, or rejects with `error`
//!
//! Each request settles exactly once. Replies arriving after a timeout find
//! no entry and are dropped.
//!
//! # Inbound Routing
//!
//! For each decoded frame:
//! - a non-null `id` marks a reply: it settles the pending entry with that
//!   id, or is logged and dropped when there is none
//! - otherwise a non-empty `method` with a registered handler goes to the
//!   handler
//! - anything else is logged and dropped
//!
//! A reply is a failure whenever it carries an `error` member, even
//! `"error": null`; only an absent `error` resolves with `result`.

use crate::config::MAX_REQUEST_ID_CEILING;
use crate::metrics::{ClientMetrics, RequestOutcome};
use crate::notification::NotificationHandler;
use crate::transport::{ReadyState, Transport};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wsrpc_core::{
    codec, Error, Id, InboundEnvelope, JsonRpcNotification, JsonRpcRequest, LogSink, Result,
};

/// Rewrites an outbound request frame just before it is sent
pub type FrameMutator = Box<dyn FnOnce(&mut JsonRpcRequest) + Send>;

/// Receiver for one request's settlement
pub(crate) type ReplyReceiver = oneshot::Receiver<Result<Value>>;

struct PendingRequest {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
    timer: Option<JoinHandle<()>>,
    started: Instant,
}

struct CorrelatorState {
    last_id: u64,
    max_id: u64,
    pending: HashMap<Id, PendingRequest>,
}

pub(crate) struct Correlator {
    state: Mutex<CorrelatorState>,
    notifications: NotificationHandler,
    default_timeout: Duration,
    log: Arc<dyn LogSink>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Correlator {
    pub(crate) fn new(
        default_timeout: Duration,
        max_id: u64,
        notifications: NotificationHandler,
        log: Arc<dyn LogSink>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            state: Mutex::new(CorrelatorState {
                last_id: 0,
                max_id: max_id.clamp(1, MAX_REQUEST_ID_CEILING),
                pending: HashMap::new(),
            }),
            notifications,
            default_timeout,
            log,
            metrics,
        }
    }

    pub(crate) fn notifications(&self) -> &NotificationHandler {
        &self.notifications
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn next_id(state: &mut CorrelatorState) -> u64 {
        if state.last_id >= state.max_id {
            state.last_id = 0;
        }
        state.last_id += 1;
        state.last_id
    }

    /// Send a request and register it; the receiver yields its settlement
    pub(crate) fn begin_request(
        self: &Arc<Self>,
        transport: Option<Arc<dyn Transport>>,
        method: String,
        params: Option<Value>,
        timeout: Option<Duration>,
        mutator: Option<FrameMutator>,
    ) -> Result<ReplyReceiver> {
        let allocated = Self::next_id(&mut self.state.lock());

        let mut request = JsonRpcRequest::new(method.clone(), params, Id::from(allocated));
        if let Some(mutate) = mutator {
            mutate(&mut request);
        }
        let id = request.id.clone();

        let mut state = self.state.lock();
        if state.pending.contains_key(&id) {
            drop(state);
            self.log.error("repeat request", &id);
            return Err(Error::RepeatRequest(id));
        }
        let transport = match transport {
            Some(t) if t.ready_state() == ReadyState::Open => t,
            _ => {
                drop(state);
                self.log.error("socket not open", &method);
                return Err(Error::NotOpen);
            }
        };

        let text = codec::encode_request(&request)?;
        let (tx, rx) = oneshot::channel();
        state.pending.insert(
            id.clone(),
            PendingRequest {
                method: method.clone(),
                tx,
                timer: None,
                started: Instant::now(),
            },
        );
        drop(state);

        self.log.debug("send request", &text);
        if let Err(e) = transport.send(text) {
            self.state.lock().pending.remove(&id);
            self.log.error("send failed", &e);
            return Err(e);
        }

        let timer = self.arm_timer(id.clone(), timeout.unwrap_or(self.default_timeout));
        let mut state = self.state.lock();
        match state.pending.get_mut(&id) {
            Some(pending) => pending.timer = Some(timer),
            // already settled by a fast reply
            None => timer.abort(),
        }

        Ok(rx)
    }

    fn arm_timer(self: &Arc<Self>, id: Id, timeout: Duration) -> JoinHandle<()> {
        let correlator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(correlator) = correlator.upgrade() {
                correlator.expire(&id);
            }
        })
    }

    fn expire(&self, id: &Id) {
        let pending = self.state.lock().pending.remove(id);
        if let Some(pending) = pending {
            self.log.warn("request timeout", &(id, &pending.method));
            self.finish(pending, RequestOutcome::Timeout, |method| {
                Err(Error::Timeout { method })
            });
        }
    }

    fn finish<F>(&self, pending: PendingRequest, outcome: RequestOutcome, settle: F)
    where
        F: FnOnce(String) -> Result<Value>,
    {
        if let Some(timer) = pending.timer {
            timer.abort();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_request(&pending.method, outcome, pending.started.elapsed().as_secs_f64());
        }
        // the caller may have stopped waiting
        let _ = pending.tx.send(settle(pending.method));
    }

    /// Send a notification if the transport is open; dropped silently otherwise
    pub(crate) fn send_notification(
        &self,
        transport: Option<Arc<dyn Transport>>,
        method: String,
        params: Option<Value>,
    ) {
        let transport = match transport {
            Some(t) if t.ready_state() == ReadyState::Open => t,
            _ => {
                self.log.debug("socket not open, notification dropped", &method);
                return;
            }
        };

        let notification = JsonRpcNotification::new(method, params);
        match codec::encode_notification(&notification) {
            Ok(text) => {
                self.log.debug("send notification", &text);
                if let Err(e) = transport.send(text) {
                    self.log.debug("notification dropped", &e);
                }
            }
            Err(e) => self.log.error("notification not encodable", &e),
        }
    }

    /// Route one inbound text frame
    pub(crate) fn handle_message(&self, text: &str) {
        self.log.debug("ws message", &text);

        let envelope = match codec::decode_inbound(text) {
            Ok(envelope) => envelope,
            Err(Error::EmptyFrame) => {
                self.log.warn("ignore empty data", &text);
                self.record_dropped("empty");
                return;
            }
            Err(e) => {
                self.log.warn("ignore unparseable message", &(text, e));
                self.record_dropped("unparseable");
                return;
            }
        };

        if let Some(id) = envelope.id() {
            let pending = self.state.lock().pending.remove(&id);
            match pending {
                Some(pending) => self.settle(pending, &envelope),
                None => {
                    self.log.warn("ignore reply without pending request", &id);
                    self.record_dropped("unmatched");
                }
            }
            return;
        }

        if let Some(method) = envelope.method() {
            if self.notifications.dispatch(method, &envelope) {
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(method);
                }
                return;
            }
        }

        self.log.warn("ignore message", envelope.as_value());
        self.record_dropped("unrouted");
    }

    fn settle(&self, pending: PendingRequest, envelope: &InboundEnvelope) {
        match envelope.error() {
            Some(error) => {
                let error = error.clone();
                self.finish(pending, RequestOutcome::Remote, |_| Err(Error::Remote(error)));
            }
            None => {
                let result = envelope.result().cloned().unwrap_or(Value::Null);
                self.finish(pending, RequestOutcome::Success, |_| Ok(result));
            }
        }
    }

    /// Reject every pending request with `error`; returns how many
    pub(crate) fn reject_all(&self, error: Error) -> usize {
        let drained: Vec<PendingRequest> = self.state.lock().pending.drain().map(|(_, p)| p).collect();
        let count = drained.len();
        for pending in drained {
            let error = error.clone();
            self.finish(pending, RequestOutcome::Closed, |_| Err(error));
        }
        if count > 0 {
            self.log.debug("rejected pending requests", &count);
        }
        count
    }

    fn record_dropped(&self, reason: &'static str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped_frame(reason);
        }
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        for (_, pending) in self.state.get_mut().pending.drain() {
            if let Some(timer) = pending.timer {
                timer.abort();
            }
        }
    }
}
