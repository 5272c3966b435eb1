//! Notification handler registry
//!
//! Server-to-client messages that carry a `method` and don't answer one of
//! our requests are dispatched here by method name. Handlers run
//! synchronously on the client's event task, in arrival order, and receive
//! the whole inbound envelope (not just `params`), so they can read any
//! extra fields the server attached.
//!
//! Messages whose method has no handler are logged and dropped.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wsrpc_client::ClientBuilder;
//!
//! # fn example() -> wsrpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .notification("ticker.update", |envelope| {
//!         println!("tick: {:?}", envelope.params());
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use wsrpc_core::{Error, InboundEnvelope, Result};

/// Handler invoked with each matching inbound notification
pub type NotificationFn = Arc<dyn Fn(&InboundEnvelope) + Send + Sync>;

/// Method name to handler map
#[derive(Clone, Default)]
pub struct NotificationHandler {
    handlers: Arc<RwLock<HashMap<String, NotificationFn>>>,
}

impl NotificationHandler {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing any previous one
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `method` is empty.
    pub fn register<F>(&self, method: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        self.register_arc(method, Arc::new(handler))
    }

    pub(crate) fn register_arc(&self, method: impl Into<String>, handler: NotificationFn) -> Result<()> {
        let method = method.into();
        if method.is_empty() {
            return Err(Error::InvalidConfig(
                "notification method cannot be empty".to_string(),
            ));
        }
        self.handlers.write().insert(method, handler);
        Ok(())
    }

    /// Call the handler for `method`; returns false if there is none
    pub fn dispatch(&self, method: &str, envelope: &InboundEnvelope) -> bool {
        // clone out so a handler may (un)register without deadlocking
        let handler = self.handlers.read().get(method).cloned();
        match handler {
            Some(handler) => {
                handler(envelope);
                true
            }
            None => false,
        }
    }

    /// Whether `method` has a handler
    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.read().contains_key(method)
    }

    /// Remove the handler for `method`
    pub fn unregister(&self, method: &str) -> bool {
        self.handlers.write().remove(method).is_some()
    }

    /// Registered method names
    pub fn methods(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}
