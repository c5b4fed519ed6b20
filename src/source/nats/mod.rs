//! NATS event source
//!
//! Subscribes to a subject pattern on a NATS server. Every server process
//! runs its own subscription (no queue group) so each dispatcher sees every
//! event.

mod client;

pub use client::NatsClient;

use super::EventSource;
use crate::config::NatsSourceConfig;
use crate::error::{RealtimeError, Result};
use crate::types::RawEvent;
use async_trait::async_trait;
use futures::StreamExt;

/// `EventSource` backed by a NATS core subscription
pub struct NatsSource {
    client: NatsClient,
    subscriber: async_nats::Subscriber,
}

impl NatsSource {
    /// Connect and subscribe using `config`
    pub async fn connect(config: NatsSourceConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Self::from_client(client).await
    }

    /// Subscribe using an existing client
    pub async fn from_client(client: NatsClient) -> Result<Self> {
        let subscriber = client.subscribe().await?;
        Ok(Self { client, subscriber })
    }

    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl EventSource for NatsSource {
    async fn next(&mut self) -> Result<Option<RawEvent>> {
        let Some(msg) = self.subscriber.next().await else {
            return Ok(None);
        };

        let key = msg.subject.to_string();
        let payload = serde_json::from_slice(&msg.payload)
            .map_err(|e| RealtimeError::malformed(&key, format!("invalid JSON payload: {}", e)))?;

        Ok(Some(RawEvent { key, payload }))
    }

    fn name(&self) -> &str {
        "nats"
    }
}
