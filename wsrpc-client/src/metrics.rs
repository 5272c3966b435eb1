//! Client metrics
//!
//! OpenTelemetry instruments for connection health and request traffic.
//! They are recorded only when the client is built with
//! `ClientBuilder::with_metrics()` or `with_observability()`, and exported by
//! whatever meter provider the application installed.
//!
//! # Metrics Collected
//!
//! - **wsrpc.client.connection.status**: 0 closed, 1 connecting, 2 open (gauge)
//! - **wsrpc.client.requests.total**: settled requests by method and outcome (counter)
//! - **wsrpc.client.request.duration**: seconds from send to settlement (histogram)
//! - **wsrpc.client.request.timeouts**: requests that hit their deadline (counter)
//! - **wsrpc.client.notifications.received**: dispatched notifications (counter)
//! - **wsrpc.client.reconnect.attempts**: reconnect timers that fired (counter)
//! - **wsrpc.client.frames.dropped**: inbound frames ignored, by reason (counter)

use crate::connection_state::ConnectionStatus;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Outcome label for a settled request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Reply carried a result
    Success,
    /// Reply carried an error
    Remote,
    /// No reply before the deadline
    Timeout,
    /// Rejected because the connection closed
    Closed,
}

impl RequestOutcome {
    fn as_str(self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Remote => "remote_error",
            RequestOutcome::Timeout => "timeout",
            RequestOutcome::Closed => "closed",
        }
    }
}

/// Instruments recorded by the client
pub struct ClientMetrics {
    connection_status: Gauge<i64>,
    requests_total: Counter<u64>,
    request_duration: Histogram<f64>,
    request_timeouts: Counter<u64>,
    notifications_received: Counter<u64>,
    reconnect_attempts: Counter<u64>,
    frames_dropped: Counter<u64>,
}

impl ClientMetrics {
    /// Instruments on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into()).build(),
        );
        Self::new_with_meter(&meter)
    }

    /// Instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_status: meter
                .i64_gauge("wsrpc.client.connection.status")
                .with_description("Connection status (0=closed, 1=connecting, 2=open)")
                .build(),
            requests_total: meter
                .u64_counter("wsrpc.client.requests.total")
                .with_description("Settled requests by method and outcome")
                .build(),
            request_duration: meter
                .f64_histogram("wsrpc.client.request.duration")
                .with_description("Seconds from send to settlement")
                .with_unit("s")
                .build(),
            request_timeouts: meter
                .u64_counter("wsrpc.client.request.timeouts")
                .with_description("Requests that received no reply in time")
                .build(),
            notifications_received: meter
                .u64_counter("wsrpc.client.notifications.received")
                .with_description("Notifications dispatched to a handler")
                .build(),
            reconnect_attempts: meter
                .u64_counter("wsrpc.client.reconnect.attempts")
                .with_description("Reconnect attempts started")
                .build(),
            frames_dropped: meter
                .u64_counter("wsrpc.client.frames.dropped")
                .with_description("Inbound frames ignored")
                .build(),
        }
    }

    pub(crate) fn record_status(&self, status: ConnectionStatus) {
        let value = match status {
            ConnectionStatus::Closed => 0,
            ConnectionStatus::Connecting => 1,
            ConnectionStatus::Open => 2,
        };
        self.connection_status.record(value, &[]);
    }

    pub(crate) fn record_request(&self, method: &str, outcome: RequestOutcome, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
        if outcome == RequestOutcome::Timeout {
            self.request_timeouts
                .add(1, &[KeyValue::new("method", method.to_string())]);
        }
    }

    pub(crate) fn record_notification(&self, method: &str) {
        self.notifications_received
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    pub(crate) fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    pub(crate) fn record_dropped_frame(&self, reason: &'static str) {
        self.frames_dropped.add(1, &[KeyValue::new("reason", reason)]);
    }
}
