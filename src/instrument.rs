//! Emission instrumentation: bytes pushed per namespace
//!
//! Diagnostic only. When enabled, every successful emission is logged as
//! `namespace=<id> bytes=<n>` and added to per-namespace counters.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Counters for one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub events: u64,
    pub bytes: u64,
    pub last_key: String,
}

/// Toggleable emission recorder
#[derive(Debug, Default)]
pub struct Instrumentation {
    enabled: AtomicBool,
    stats: Mutex<HashMap<String, NamespaceStats>>,
}

impl Instrumentation {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record one emission; no-op while disabled
    pub fn record(&self, namespace_id: &str, key: &str, bytes: usize) {
        if !self.is_enabled() {
            return;
        }

        tracing::info!(
            namespace = %namespace_id,
            key = %key,
            bytes,
            "[RT] namespace={} bytes={}",
            namespace_id,
            bytes
        );

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry(namespace_id.to_string()).or_default();
        entry.events += 1;
        entry.bytes += bytes as u64;
        entry.last_key.clear();
        entry.last_key.push_str(key);
    }

    /// Counters for one namespace
    pub fn namespace(&self, namespace_id: &str) -> Option<NamespaceStats> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.get(namespace_id).cloned()
    }

    /// Copy of all counters
    pub fn stats(&self) -> HashMap<String, NamespaceStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
