//! Fan-out dispatcher: routes one inbound event to matching namespaces
//!
//! Per event:
//! 1. control check: namespace initialize/teardown keys mutate the registry
//!    and are not forwarded
//! 2. the envelope is parsed and its wire payload serialized exactly once
//! 3. the registry is snapshotted
//! 4. every namespace in the snapshot is matched; matching namespaces are
//!    emitted to concurrently, each failure isolated to its namespace
//! 5. successful emissions are instrumented
//!
//! `dispatch` returns only after every emit of the event has settled, so a
//! caller dispatching events one at a time preserves publish order per
//! namespace.

use crate::config::RealtimeConfig;
use crate::envelope::Envelope;
use crate::error::{RealtimeError, Result};
use crate::instrument::Instrumentation;
use crate::matcher::{self, EmptyValuePolicy};
use crate::registry::{SubscriptionHandle, SubscriptionRegistry};
use crate::transport::ChannelDirectory;
use crate::types::{PerspectiveDefinition, RawEvent};
use bytes::Bytes;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// What a dispatched event did
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Namespace-initialize control event registered a namespace
    Registered(SubscriptionHandle),
    /// Namespace-teardown control event; `existed` is false if it was unknown
    Unregistered { namespace_id: String, existed: bool },
    /// Data event fanned out to namespaces
    Delivered(DeliveryReport),
}

/// Per-event fan-out summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub key: String,
    /// Serialized payload size in bytes
    pub bytes: usize,
    /// Namespaces whose filters matched
    pub matched: Vec<String>,
    /// Namespaces the payload was written to
    pub delivered: Vec<String>,
    /// Matched namespaces with no open channel (client already gone)
    pub closed: Vec<String>,
    /// Matched namespaces whose write failed
    pub failed: Vec<String>,
}

enum EmitResult {
    Delivered,
    Closed,
    Failed(RealtimeError),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeardownRequest {
    namespace_id: String,
}

/// Routes inbound events to namespace channels
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    directory: Arc<dyn ChannelDirectory>,
    instrumentation: Arc<Instrumentation>,
    init_prefix: String,
    teardown_prefix: String,
    policy: EmptyValuePolicy,
    emit_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a dispatcher reading `registry` and writing to `directory`
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        directory: Arc<dyn ChannelDirectory>,
        config: &RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            directory,
            instrumentation: Arc::new(Instrumentation::new(config.instrument_events)),
            init_prefix: config.init_event_prefix.clone(),
            teardown_prefix: config.teardown_event_prefix.clone(),
            policy: config.empty_value_policy,
            emit_timeout: config.emit_timeout(),
        }
    }

    /// Share an instrumentation hook across dispatchers
    pub fn with_instrumentation(mut self, instrumentation: Arc<Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }

    /// Dispatch a raw event from the bus
    pub async fn dispatch_raw(&self, event: RawEvent) -> Result<DispatchOutcome> {
        self.dispatch(&event.key, event.payload).await
    }

    /// Dispatch one `(key, payload)` pair
    ///
    /// Fails with `MalformedEvent` when the payload or an embedded
    /// perspective definition is malformed, or `InvalidFilter` when a
    /// control event carries contradictory filters. Per-namespace
    /// transport failures never fail the event.
    pub async fn dispatch(&self, key: &str, payload: serde_json::Value) -> Result<DispatchOutcome> {
        if key.starts_with(&self.init_prefix) {
            let def = PerspectiveDefinition::from_payload(key, &payload)?;
            let handle = self.registry.register(def.namespace_id, def.filters)?;
            return Ok(DispatchOutcome::Registered(handle));
        }

        if key.starts_with(&self.teardown_prefix) {
            let body = payload.get("new").unwrap_or(&payload).clone();
            let req: TeardownRequest = serde_json::from_value(body)
                .map_err(|e| RealtimeError::malformed(key, format!("bad teardown: {}", e)))?;
            let existed = self.registry.unregister(&req.namespace_id);
            return Ok(DispatchOutcome::Unregistered {
                namespace_id: req.namespace_id,
                existed,
            });
        }

        let envelope = Envelope::parse(key, payload)?;
        self.fan_out(&envelope).await.map(DispatchOutcome::Delivered)
    }

    /// Serialize once, then emit to every matching namespace in a snapshot
    pub async fn fan_out(&self, envelope: &Envelope) -> Result<DeliveryReport> {
        let payload = Bytes::from(serde_json::to_vec(&envelope.wire_payload())?);
        let key = envelope.key();
        let snapshot = self.registry.snapshot();

        let matched: Vec<&str> = snapshot
            .iter()
            .filter(|sub| matcher::matches(envelope, sub.filters(), self.policy))
            .map(|sub| sub.namespace_id())
            .collect();

        let results = join_all(
            matched
                .iter()
                .map(|namespace_id| self.emit(namespace_id, key, payload.clone())),
        )
        .await;

        let mut report = DeliveryReport {
            key: key.to_string(),
            bytes: payload.len(),
            matched: matched.iter().map(|ns| ns.to_string()).collect(),
            ..Default::default()
        };

        for (namespace_id, result) in matched.iter().zip(results) {
            match result {
                EmitResult::Delivered => {
                    self.instrumentation.record(namespace_id, key, payload.len());
                    report.delivered.push(namespace_id.to_string());
                }
                EmitResult::Closed => {
                    tracing::debug!(
                        namespace = %namespace_id,
                        key = %key,
                        "Namespace channel closed, event skipped"
                    );
                    report.closed.push(namespace_id.to_string());
                }
                EmitResult::Failed(e) => {
                    tracing::warn!(
                        namespace = %namespace_id,
                        key = %key,
                        error = %e,
                        "Failed to emit event to namespace"
                    );
                    report.failed.push(namespace_id.to_string());
                }
            }
        }

        tracing::debug!(
            key = %key,
            namespaces = snapshot.len(),
            matched = report.matched.len(),
            delivered = report.delivered.len(),
            bytes = report.bytes,
            "Event fanned out"
        );

        Ok(report)
    }

    async fn emit(&self, namespace_id: &str, key: &str, payload: Bytes) -> EmitResult {
        let Some(channel) = self.directory.channel(namespace_id) else {
            return EmitResult::Closed;
        };

        let write = channel.emit(key, payload);
        let result = match self.emit_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, write).await {
                Ok(result) => result,
                Err(_) => Err(RealtimeError::TransportWrite {
                    namespace: namespace_id.to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }),
            },
            None => write.await,
        };

        match result {
            Ok(()) => EmitResult::Delivered,
            Err(RealtimeError::ChannelClosed(_)) => EmitResult::Closed,
            Err(e @ RealtimeError::TransportWrite { .. }) => EmitResult::Failed(e),
            Err(e) => EmitResult::Failed(RealtimeError::TransportWrite {
                namespace: namespace_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
