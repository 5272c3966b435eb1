//! Client builder
//!
//! The `ClientBuilder` collects options, lifecycle callbacks and notification
//! handlers, then produces a [`SocketRpc`]. It allows you to:
//! - Load options from a [`ClientConfig`] or set them one by one
//! - Register lifecycle callbacks and notification handlers up front
//! - Swap the reconnection strategy, the log sink or the transport
//! - Turn on OpenTelemetry export and client metrics
//!
//! `build()` returns a CLOSED client. `connect()` builds and calls `open()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wsrpc_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> wsrpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .request_timeout(Duration::from_secs(5))
//!     .on_open(|| println!("connected"))
//!     .notification("ticker.update", |envelope| println!("{:?}", envelope.params()))
//!     .connect()?;
//!
//! let backoff = ClientBuilder::new("ws://localhost:8080")
//!     .with_reconnect(Box::new(ExponentialBackoff::default()))
//!     .with_metrics("ticker-client")
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, LifecycleCallbacks};
use crate::connection_state::ConnectionManager;
use crate::metrics::ClientMetrics;
use crate::notification::{NotificationFn, NotificationHandler};
use crate::reconnect::{FixedDelay, ReconnectionStrategy};
use crate::request::Correlator;
use crate::transport::{Connector, WsConnector};
use crate::SocketRpc;
use std::sync::Arc;
use std::time::Duration;
use wsrpc_core::{
    Error, InboundEnvelope, LogSink, ObservabilityConfig, Result, TracingSink, Verbosity,
};

/// Builder for configuring and creating a [`SocketRpc`]
pub struct ClientBuilder {
    config: ClientConfig,
    callbacks: LifecycleCallbacks,
    notifications: Vec<(String, NotificationFn)>,
    log_sink: Option<Arc<dyn LogSink>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    connector: Option<Arc<dyn Connector>>,
    observability_config: Option<ObservabilityConfig>,
    metrics_service: Option<String>,
}

impl ClientBuilder {
    /// Default options for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(url))
    }

    /// Start from a loaded configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            callbacks: LifecycleCallbacks::default(),
            notifications: Vec::new(),
            log_sink: None,
            reconnect_strategy: None,
            connector: None,
            observability_config: None,
            metrics_service: None,
        }
    }

    /// Reconnect attempts allowed between two successful opens (default 10)
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Delay before each reconnect attempt (default 3s)
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Default per-request timeout (default 30s)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Ceiling after which request ids wrap to 1
    pub fn max_request_id(mut self, max: u64) -> Self {
        self.config.max_request_id = max;
        self
    }

    /// Whether pending requests fail when the connection settles into CLOSED
    pub fn reject_pending_on_close(mut self, reject: bool) -> Self {
        self.config.reject_pending_on_close = reject;
        self
    }

    /// Verbosity of the default log sink, 0 to 3
    pub fn log_level(mut self, level: u8) -> Self {
        self.config.log_level = level;
        self
    }

    /// Same as [`log_level`](Self::log_level), typed
    pub fn verbosity(self, verbosity: Verbosity) -> Self {
        self.log_level(verbosity as u8)
    }

    /// Called when the status becomes OPEN
    pub fn on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_open = Some(Arc::new(callback));
        self
    }

    /// Called when the status becomes CLOSED
    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_close = Some(Arc::new(callback));
        self
    }

    /// Called on each transport error
    pub fn on_error(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    /// Called when the status becomes CONNECTING
    pub fn on_connecting(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_connecting = Some(Arc::new(callback));
        self
    }

    /// Replace all lifecycle callbacks at once
    pub fn callbacks(mut self, callbacks: LifecycleCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Handle server notifications named `method`
    ///
    /// An empty method name makes `build()` fail.
    pub fn notification<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        self.notifications.push((method.into(), Arc::new(handler)));
        self
    }

    /// Send diagnostics to `sink` instead of `tracing`
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Replace the default fixed-delay reconnection
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Use a custom transport
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Install OpenTelemetry export at build time and record client metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.metrics_service = Some(config.service_name.clone());
        self.observability_config = Some(config);
        self
    }

    /// Record client metrics on the global meter provider
    pub fn with_metrics(mut self, service_name: impl Into<String>) -> Self {
        self.metrics_service = Some(service_name.into());
        self
    }

    /// Create the client without connecting
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for invalid options or an empty
    ///   notification method
    /// - [`Error::Internal`] if observability setup fails
    pub fn build(self) -> Result<SocketRpc> {
        self.config.validate()?;

        let notifications = NotificationHandler::new();
        for (method, handler) in self.notifications {
            notifications.register_arc(method, handler)?;
        }

        if let Some(config) = self.observability_config {
            wsrpc_core::init_observability(config)
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;
        }
        let metrics = self
            .metrics_service
            .map(|name| Arc::new(ClientMetrics::new(name)));

        let log = self.log_sink.unwrap_or_else(|| {
            Arc::new(TracingSink::new(Verbosity::from(self.config.log_level)))
        });

        let strategy = self.reconnect_strategy.unwrap_or_else(|| {
            Box::new(
                FixedDelay::new(self.config.reconnect_delay)
                    .with_max_attempts(self.config.max_reconnect_attempts),
            )
        });
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector));

        let connection = ConnectionManager::new(
            self.config.url.clone(),
            connector,
            strategy,
            self.callbacks,
            Arc::clone(&log),
            metrics.clone(),
        );
        let correlator = Arc::new(Correlator::new(
            self.config.request_timeout,
            self.config.max_request_id,
            notifications,
            Arc::clone(&log),
            metrics,
        ));

        Ok(SocketRpc::from_parts(
            connection,
            correlator,
            self.config.reject_pending_on_close,
            log,
        ))
    }

    /// Build and start connecting
    ///
    /// Returns as soon as the connection attempt has started; wait for
    /// [`ConnectionStatus::Open`](crate::ConnectionStatus::Open) with
    /// `SocketRpc::wait_for_status` before sending requests.
    pub fn connect(self) -> Result<SocketRpc> {
        let client = self.build()?;
        client.open();
        Ok(client)
    }
}
