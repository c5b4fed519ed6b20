//! Transport abstraction: per-namespace push channels
//!
//! The dispatcher needs exactly two things from the transport layer: a
//! one-way `emit(event_name, payload)` per namespace, and a way to look up
//! the channel currently open for a namespace id. `MemoryTransport` is an
//! in-process implementation backed by tokio mpsc channels, used in tests
//! and single-process deployments.

use crate::error::{RealtimeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default per-namespace buffer of the in-memory transport
const DEFAULT_CAPACITY: usize = 256;

/// One-way push channel for a single namespace
#[async_trait]
pub trait Channel: Send + Sync {
    /// Push a serialized payload under `event_name`
    ///
    /// Must not wait on a slow peer: a backed-up peer is reported as
    /// `TransportWrite` immediately. Returns `ChannelClosed` when the peer
    /// has gone away.
    async fn emit(&self, event_name: &str, payload: Bytes) -> Result<()>;
}

/// Lookup of currently open channels by namespace id
pub trait ChannelDirectory: Send + Sync {
    /// Channel for a namespace, if one is open
    fn channel(&self, namespace_id: &str) -> Option<Arc<dyn Channel>>;

    /// Ids of all namespaces with an open channel
    fn namespaces(&self) -> Vec<String>;
}

/// A payload delivered to a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub event_name: String,
    pub payload: Bytes,
}

impl Emission {
    /// Payload as UTF-8 text
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload parsed back into JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// In-memory channel feeding a bounded mpsc queue
///
/// A full queue drops the emission for this namespace only.
#[derive(Debug)]
pub struct MemoryChannel {
    namespace_id: String,
    tx: mpsc::Sender<Emission>,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn emit(&self, event_name: &str, payload: Bytes) -> Result<()> {
        let emission = Emission {
            event_name: event_name.to_string(),
            payload,
        };
        self.tx.try_send(emission).map_err(|e| match e {
            TrySendError::Full(_) => RealtimeError::TransportWrite {
                namespace: self.namespace_id.clone(),
                reason: format!("queue full ({} pending)", self.tx.max_capacity()),
            },
            TrySendError::Closed(_) => RealtimeError::ChannelClosed(self.namespace_id.clone()),
        })
    }
}

/// In-memory transport: one mpsc queue per open namespace
#[derive(Debug)]
pub struct MemoryTransport {
    channels: RwLock<HashMap<String, Arc<MemoryChannel>>>,
    capacity: usize,
}

impl MemoryTransport {
    /// Create a transport whose channels buffer `capacity` emissions
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Open (or reopen) the channel for a namespace and return its receiver
    pub fn open(&self, namespace_id: impl Into<String>) -> mpsc::Receiver<Emission> {
        let namespace_id = namespace_id.into();
        let (tx, rx) = mpsc::channel(self.capacity);
        let channel = Arc::new(MemoryChannel {
            namespace_id: namespace_id.clone(),
            tx,
        });

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels.insert(namespace_id.clone(), channel);
        tracing::debug!(namespace = %namespace_id, "Channel opened");
        rx
    }

    /// Close the channel for a namespace; returns false if none was open
    pub fn close(&self, namespace_id: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let closed = channels.remove(namespace_id).is_some();
        if closed {
            tracing::debug!(namespace = %namespace_id, "Channel closed");
        }
        closed
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChannelDirectory for MemoryTransport {
    fn channel(&self, namespace_id: &str) -> Option<Arc<dyn Channel>> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(namespace_id)
            .map(|c| Arc::clone(c) as Arc<dyn Channel>)
    }

    fn namespaces(&self) -> Vec<String> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = channels.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_emit_receive() {
        let transport = MemoryTransport::default();
        let mut rx = transport.open("ns1");

        let channel = transport.channel("ns1").unwrap();
        channel
            .emit("sample.update", Bytes::from_static(br#"{"a":1}"#))
            .await
            .unwrap();

        let emission = rx.recv().await.unwrap();
        assert_eq!(emission.event_name, "sample.update");
        assert_eq!(emission.payload_str(), Some(r#"{"a":1}"#));
        assert_eq!(emission.json().unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped() {
        let transport = MemoryTransport::default();
        let rx = transport.open("ns1");
        let channel = transport.channel("ns1").unwrap();
        drop(rx);

        let err = channel.emit("k", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, RealtimeError::ChannelClosed(ref ns) if ns == "ns1"));
    }

    #[tokio::test]
    async fn test_emit_to_full_queue_fails_without_waiting() {
        let transport = MemoryTransport::new(1);
        let mut rx = transport.open("ns1");
        let channel = transport.channel("ns1").unwrap();

        channel.emit("k", Bytes::from_static(b"1")).await.unwrap();
        let err = channel.emit("k", Bytes::from_static(b"2")).await.unwrap_err();
        assert!(matches!(err, RealtimeError::TransportWrite { ref namespace, .. } if namespace == "ns1"));

        assert_eq!(rx.recv().await.unwrap().payload_str(), Some("1"));
        channel.emit("k", Bytes::from_static(b"3")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().payload_str(), Some("3"));
    }

    #[test]
    fn test_close_and_namespaces() {
        let transport = MemoryTransport::default();
        let _rx1 = transport.open("ns2");
        let _rx2 = transport.open("ns1");
        assert_eq!(transport.namespaces(), vec!["ns1", "ns2"]);

        assert!(transport.close("ns1"));
        assert!(!transport.close("ns1"));
        assert!(transport.channel("ns1").is_none());
        assert_eq!(transport.namespaces(), vec!["ns2"]);
    }
}
