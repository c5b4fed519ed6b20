//! # a3s-realtime
//!
//! Filtered realtime fan-out of model-change events to perspective namespaces.
//!
//! ## Overview
//!
//! Backend workers publish change notifications as `(key, payload)` pairs.
//! Each connected client joins a *namespace* scoped by a perspective's
//! filters (subject name, subject tags, aspect name, aspect tags, status,
//! root subject). For every event, `a3s-realtime` serializes the payload
//! once and pushes it only to the namespaces whose filters match.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_realtime::{FieldFilter, FilterField, Filters, RealtimeConfig, RealtimeHub};
//!
//! # async fn example() -> a3s_realtime::Result<()> {
//! let hub = RealtimeHub::new(&RealtimeConfig::default());
//!
//! // A client opens a namespace watching one subject
//! let filters = Filters::new()
//!     .with(FilterField::SubjectName, FieldFilter::include(["Node1"]));
//! let (_handle, mut rx) = hub.open_namespace("/perspectives/node1", filters)?;
//!
//! // A worker reports a sample change
//! hub.publish(
//!     "refocus.internal.realtime.sample.update",
//!     serde_json::json!({"new": {"subjectName": "Node1", "status": "OK"}}),
//! ).await?;
//!
//! let emission = rx.recv().await.expect("delivered");
//! println!("{}: {:?}", emission.event_name, emission.payload_str());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Envelope**: validated change notification with typed attribute accessors
//! - **SubscriptionRegistry**: namespaces and filters, copy-on-write snapshots
//! - **matcher**: pure include/exclude predicate with `*`/`?` wildcards
//! - **Dispatcher**: control events, single serialization, isolated per-namespace emits
//! - **EventSource**: inbound bus (in-memory or NATS)
//! - **Channel / ChannelDirectory**: outbound per-namespace push

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod instrument;
pub mod matcher;
pub mod registry;
pub mod service;
pub mod source;
pub mod transport;
pub mod types;
pub mod wildcard;

// Re-export core types
pub use config::{NatsSourceConfig, RealtimeConfig};
pub use dispatcher::{DeliveryReport, DispatchOutcome, Dispatcher};
pub use envelope::Envelope;
pub use error::{RealtimeError, Result};
pub use hub::RealtimeHub;
pub use instrument::{Instrumentation, NamespaceStats};
pub use matcher::{matches, EmptyValuePolicy};
pub use registry::{Snapshot, Subscription, SubscriptionHandle, SubscriptionRegistry};
pub use service::{RealtimeService, ServiceStats};
pub use source::EventSource;
pub use transport::{Channel, ChannelDirectory, Emission, MemoryChannel, MemoryTransport};
pub use types::{
    EventAction, FieldFilter, FilterField, Filters, PerspectiveDefinition, RawEvent, SubjectKind,
};

// Re-export sources for convenience
pub use source::memory::{MemoryPublisher, MemorySource};
pub use source::nats::{NatsClient, NatsSource};
