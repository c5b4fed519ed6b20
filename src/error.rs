//! Error types for a3s-realtime

use thiserror::Error;

/// Errors that can occur in the realtime fan-out layer
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Envelope or control payload failed shape validation
    #[error("Malformed event '{key}': {reason}")]
    MalformedEvent {
        key: String,
        reason: String,
    },

    /// Self-contradictory or unknown subscription filter
    #[error("Invalid filter for namespace '{namespace}': {reason}")]
    InvalidFilter {
        namespace: String,
        reason: String,
    },

    /// Emission to a single namespace channel failed
    #[error("Failed to emit to namespace '{namespace}': {reason}")]
    TransportWrite {
        namespace: String,
        reason: String,
    },

    /// Namespace channel is already closed (client disconnected)
    #[error("Channel closed for namespace '{0}'")]
    ChannelClosed(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event source connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Event source subscription failure
    #[error("Failed to subscribe to subject '{subject}': {reason}")]
    Subscribe {
        subject: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RealtimeError {
    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_filter(namespace: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            namespace: namespace.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for realtime operations
pub type Result<T> = std::result::Result<T, RealtimeError>;
