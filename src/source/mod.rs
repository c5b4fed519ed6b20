//! Event sources: the inbound bus feeding the dispatcher
//!
//! Backend workers publish `(key, payload)` pairs whenever a model changes.
//! Every bus backend implements `EventSource` so the service loop does not
//! care where events come from.

use crate::error::Result;
use crate::types::RawEvent;
use async_trait::async_trait;

pub mod memory;
pub mod nats;

/// Async stream of raw events from a bus
#[async_trait]
pub trait EventSource: Send {
    /// Receive the next event; `Ok(None)` once the bus is closed
    ///
    /// A malformed message yields `Err(MalformedEvent)`; the source stays
    /// usable and the next call continues with the following message.
    async fn next(&mut self) -> Result<Option<RawEvent>>;

    /// Source name (e.g., "memory", "nats")
    fn name(&self) -> &str;
}
