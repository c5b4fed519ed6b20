//! Realtime service loop: drives an event source into a dispatcher
//!
//! Events are dispatched strictly one at a time, which keeps per-subject
//! publish order intact for every namespace. Failed events are logged and
//! dropped; the loop only stops when the source closes or shutdown fires.

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::Result;
use crate::source::EventSource;
use std::future::Future;
use std::sync::Arc;

/// Counters for one run of the service loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub received: u64,
    pub delivered: u64,
    pub registered: u64,
    pub unregistered: u64,
    pub dropped: u64,
}

/// Sequential consumer of one event source
pub struct RealtimeService<S: EventSource> {
    source: S,
    dispatcher: Arc<Dispatcher>,
}

impl<S: EventSource> RealtimeService<S> {
    pub fn new(source: S, dispatcher: Arc<Dispatcher>) -> Self {
        Self { source, dispatcher }
    }

    /// Run until the source closes
    pub async fn run(self) -> Result<ServiceStats> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until the source closes or `shutdown` resolves
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<ServiceStats> {
        let mut stats = ServiceStats::default();
        tokio::pin!(shutdown);

        tracing::info!(source = %self.source.name(), "Realtime service started");

        loop {
            let next = tokio::select! {
                _ = &mut shutdown => break,
                next = self.source.next() => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    stats.dropped += 1;
                    tracing::warn!(error = %e, "Dropped unreadable event");
                    continue;
                }
            };

            stats.received += 1;
            let key = event.key.clone();
            match self.dispatcher.dispatch_raw(event).await {
                Ok(DispatchOutcome::Delivered(_)) => stats.delivered += 1,
                Ok(DispatchOutcome::Registered(_)) => stats.registered += 1,
                Ok(DispatchOutcome::Unregistered { .. }) => stats.unregistered += 1,
                Err(e) => {
                    stats.dropped += 1;
                    tracing::warn!(key = %key, error = %e, "Dropped event");
                }
            }
        }

        tracing::info!(
            source = %self.source.name(),
            received = stats.received,
            dropped = stats.dropped,
            "Realtime service stopped"
        );
        Ok(stats)
    }
}
