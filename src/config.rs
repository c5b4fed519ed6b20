//! Configuration for the realtime fan-out layer
//!
//! All structs deserialize from camelCase JSON with defaults for every
//! field, and can be overridden from `A3S_REALTIME_*` environment variables.

use crate::error::{RealtimeError, Result};
use crate::matcher::EmptyValuePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key prefix of the control event that opens a perspective namespace
pub const DEFAULT_INIT_EVENT: &str = "refocus.internal.realtime.perspective.namespace.initialize";

/// Key prefix of the control event that tears a perspective namespace down
pub const DEFAULT_TEARDOWN_EVENT: &str = "refocus.internal.realtime.perspective.namespace.teardown";

/// Subject pattern the NATS source listens on by default
pub const DEFAULT_SUBJECT: &str = "refocus.internal.realtime.>";

const ENV_PREFIX: &str = "A3S_REALTIME_";

/// Fan-out configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeConfig {
    /// Keys starting with this prefix register a namespace instead of being forwarded
    #[serde(default = "default_init_event")]
    pub init_event_prefix: String,

    /// Keys starting with this prefix unregister a namespace
    #[serde(default = "default_teardown_event")]
    pub teardown_event_prefix: String,

    /// Outcome of include filters on events lacking the filtered attribute
    #[serde(default)]
    pub empty_value_policy: EmptyValuePolicy,

    /// Log and count bytes emitted per namespace per event
    #[serde(default)]
    pub instrument_events: bool,

    /// Per-namespace emit timeout in milliseconds (0 disables the timeout)
    #[serde(default = "default_emit_timeout_ms")]
    pub emit_timeout_ms: u64,

    /// Inbound NATS bus settings
    #[serde(default)]
    pub nats: NatsSourceConfig,
}

fn default_init_event() -> String {
    DEFAULT_INIT_EVENT.to_string()
}

fn default_teardown_event() -> String {
    DEFAULT_TEARDOWN_EVENT.to_string()
}

fn default_emit_timeout_ms() -> u64 {
    5_000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            init_event_prefix: default_init_event(),
            teardown_event_prefix: default_teardown_event(),
            empty_value_policy: EmptyValuePolicy::default(),
            instrument_events: false,
            emit_timeout_ms: default_emit_timeout_ms(),
            nats: NatsSourceConfig::default(),
        }
    }
}

impl RealtimeConfig {
    /// Defaults overridden by `A3S_REALTIME_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup
    ///
    /// Recognised names (all prefixed with `A3S_REALTIME_`): `INSTRUMENT`,
    /// `EMPTY_VALUE_POLICY`, `EMIT_TIMEOUT_MS`, `INIT_EVENT`,
    /// `TEARDOWN_EVENT`, `NATS_URL`, `NATS_SUBJECT`, `NATS_TOKEN`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("INSTRUMENT") {
            self.instrument_events = parse_bool("INSTRUMENT", &v)?;
        }
        if let Some(v) = var("EMPTY_VALUE_POLICY") {
            self.empty_value_policy = match v.trim().to_ascii_lowercase().as_str() {
                "reject" => EmptyValuePolicy::Reject,
                "accept" => EmptyValuePolicy::Accept,
                other => {
                    return Err(RealtimeError::Config(format!(
                        "{}EMPTY_VALUE_POLICY must be 'reject' or 'accept', got '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(v) = var("EMIT_TIMEOUT_MS") {
            self.emit_timeout_ms = v.trim().parse().map_err(|e| {
                RealtimeError::Config(format!("{}EMIT_TIMEOUT_MS: {}", ENV_PREFIX, e))
            })?;
        }
        if let Some(v) = var("INIT_EVENT") {
            self.init_event_prefix = v;
        }
        if let Some(v) = var("TEARDOWN_EVENT") {
            self.teardown_event_prefix = v;
        }
        if let Some(v) = var("NATS_URL") {
            self.nats.url = v;
        }
        if let Some(v) = var("NATS_SUBJECT") {
            self.nats.subject = v;
        }
        if let Some(v) = var("NATS_TOKEN") {
            self.nats.token = Some(v);
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject configurations that would misroute control events
    pub fn validate(&self) -> Result<()> {
        if self.init_event_prefix.is_empty() || self.teardown_event_prefix.is_empty() {
            return Err(RealtimeError::Config(
                "control event prefixes cannot be empty".to_string(),
            ));
        }
        if self.init_event_prefix.starts_with(&self.teardown_event_prefix)
            || self.teardown_event_prefix.starts_with(&self.init_event_prefix)
        {
            return Err(RealtimeError::Config(format!(
                "control event prefixes overlap: '{}' / '{}'",
                self.init_event_prefix, self.teardown_event_prefix
            )));
        }
        if self.nats.subject.is_empty() {
            return Err(RealtimeError::Config("NATS subject cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Emit timeout, if enabled
    pub fn emit_timeout(&self) -> Option<Duration> {
        (self.emit_timeout_ms > 0).then(|| Duration::from_millis(self.emit_timeout_ms))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(RealtimeError::Config(format!(
            "{}{} is not a boolean: '{}'",
            ENV_PREFIX, name, other
        ))),
    }
}

/// NATS connection settings for the inbound event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsSourceConfig {
    /// Server URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Subject pattern to subscribe to; message subjects are event keys
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Connection name reported to the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Authentication token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for NatsSourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            subject: default_subject(),
            name: None,
            token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
