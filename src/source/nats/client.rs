//! NATS client: connect, publish change notifications, subscribe

use crate::config::NatsSourceConfig;
use crate::error::{RealtimeError, Result};
use crate::types::RawEvent;
use std::sync::Arc;
use std::time::Duration;

/// NATS core client for the realtime bus
///
/// Each message subject is an event key and each payload is the JSON
/// encoding of the raw event payload.
#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
    config: Arc<NatsSourceConfig>,
}

impl NatsClient {
    /// Connect to the NATS server
    pub async fn connect(config: NatsSourceConfig) -> Result<Self> {
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| RealtimeError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Publish a change notification on its key
    ///
    /// Used by backend workers and tests; the dispatcher side only subscribes.
    pub async fn publish(&self, event: &RawEvent) -> Result<()> {
        let payload = serde_json::to_vec(&event.payload)?;

        self.client
            .publish(event.key.clone(), payload.into())
            .await
            .map_err(|e| RealtimeError::Connection(format!(
                "Failed to publish '{}': {}",
                event.key, e
            )))?;

        tracing::debug!(key = %event.key, "Event published");
        Ok(())
    }

    /// Flush pending publishes to the server
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| RealtimeError::Connection(format!("Failed to flush: {}", e)))
    }

    /// Subscribe to the configured subject pattern
    pub async fn subscribe(&self) -> Result<async_nats::Subscriber> {
        let subject = self.config.subject.clone();
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| RealtimeError::Subscribe {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(subject = %subject, "Subscribed to realtime bus");
        Ok(subscriber)
    }

    /// Get the underlying NATS client
    pub fn nats_client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsSourceConfig {
        &self.config
    }
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsSourceConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    if let Some(ref name) = config.name {
        opts = opts.name(name);
    }

    opts
}
