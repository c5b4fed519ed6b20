//! In-memory event bus for tests and single-process deployments

use super::EventSource;
use crate::error::{RealtimeError, Result};
use crate::types::RawEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Default bus buffer
const DEFAULT_CAPACITY: usize = 1024;

/// Create a connected publisher/source pair
pub fn channel(capacity: usize) -> (MemoryPublisher, MemorySource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        MemoryPublisher { tx },
        MemorySource {
            events: ReceiverStream::new(rx),
        },
    )
}

/// Publishing half of the in-memory bus; clone one per worker
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    tx: mpsc::Sender<RawEvent>,
}

impl MemoryPublisher {
    /// Publish a change notification, waiting for buffer space
    pub async fn publish(&self, key: impl Into<String>, payload: serde_json::Value) -> Result<()> {
        let event = RawEvent::new(key, payload);
        let key = event.key.clone();
        self.tx.send(event).await.map_err(|_| {
            RealtimeError::Connection(format!("memory bus closed while publishing '{}'", key))
        })
    }
}

/// Receiving half of the in-memory bus
#[derive(Debug)]
pub struct MemorySource {
    events: ReceiverStream<RawEvent>,
}

impl Default for MemorySource {
    /// A source with no publishers: yields nothing and ends immediately
    fn default() -> Self {
        channel(DEFAULT_CAPACITY).1
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn next(&mut self) -> Result<Option<RawEvent>> {
        Ok(self.events.next().await)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
