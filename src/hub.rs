//! In-process realtime hub
//!
//! `RealtimeHub` wires a registry, an in-memory transport, and a dispatcher
//! together. The web tier calls `open_namespace` when a client starts a
//! realtime session and `close_namespace` when it disconnects; backend
//! workers feed events through `publish` or a [`RealtimeService`].
//!
//! [`RealtimeService`]: crate::service::RealtimeService

use crate::config::RealtimeConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::Result;
use crate::instrument::Instrumentation;
use crate::registry::{Snapshot, SubscriptionHandle, SubscriptionRegistry};
use crate::transport::{Emission, MemoryTransport};
use crate::types::{Filters, PerspectiveDefinition};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Registry + in-memory transport + dispatcher
pub struct RealtimeHub {
    registry: Arc<SubscriptionRegistry>,
    transport: Arc<MemoryTransport>,
    dispatcher: Arc<Dispatcher>,
}

impl RealtimeHub {
    /// Create a hub from config
    pub fn new(config: &RealtimeConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let transport = Arc::new(MemoryTransport::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            transport.clone(),
            config,
        ));

        Self {
            registry,
            transport,
            dispatcher,
        }
    }

    /// Register a namespace and open its channel
    ///
    /// Filter errors are returned before any channel is opened.
    pub fn open_namespace(
        &self,
        namespace_id: &str,
        filters: Filters,
    ) -> Result<(SubscriptionHandle, mpsc::Receiver<Emission>)> {
        let handle = self.registry.register(namespace_id, filters)?;
        let rx = self.transport.open(namespace_id);
        Ok((handle, rx))
    }

    /// Open a namespace from a perspective definition
    pub fn open_perspective(
        &self,
        def: PerspectiveDefinition,
    ) -> Result<(SubscriptionHandle, mpsc::Receiver<Emission>)> {
        self.open_namespace(&def.namespace_id, def.filters)
    }

    /// Unregister a namespace and close its channel
    pub fn close_namespace(&self, namespace_id: &str) -> bool {
        let unregistered = self.registry.unregister(namespace_id);
        let closed = self.transport.close(namespace_id);
        unregistered || closed
    }

    /// Dispatch one `(key, payload)` pair
    pub async fn publish(&self, key: &str, payload: serde_json::Value) -> Result<DispatchOutcome> {
        self.dispatcher.dispatch(key, payload).await
    }

    /// Close every namespace (server shutdown)
    pub fn shutdown(&self) -> usize {
        for namespace_id in self.registry.snapshot().namespace_ids() {
            self.transport.close(namespace_id);
        }
        let count = self.registry.clear();
        tracing::info!(count, "Realtime hub shut down");
        count
    }

    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<MemoryTransport> {
        &self.transport
    }

    /// Dispatcher, for handing to a [`RealtimeService`](crate::service::RealtimeService)
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn instrumentation(&self) -> &Arc<Instrumentation> {
        self.dispatcher.instrumentation()
    }
}
