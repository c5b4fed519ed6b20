//! Core types for the a3s-realtime fan-out layer
//!
//! Filter and perspective types use camelCase JSON serialization so they
//! line up with the perspective definitions produced by the web tier.

use crate::error::{RealtimeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of model a change notification is about
///
/// Derived from the event key, e.g. `refocus.internal.realtime.sample.update`
/// is a `Sample` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectKind {
    Subject,
    Sample,
    Aspect,
    Perspective,
    Other,
}

impl SubjectKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "subject" => Some(Self::Subject),
            "sample" => Some(Self::Sample),
            "aspect" => Some(Self::Aspect),
            "perspective" => Some(Self::Perspective),
            _ => None,
        }
    }

    /// Derive the kind from an event key
    ///
    /// Scans the key segments right to left, skipping the trailing action
    /// segment, and returns the first recognised kind.
    pub fn from_key(key: &str) -> Self {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((_, head)) = segments.split_last() else {
            return Self::Other;
        };
        head.iter()
            .rev()
            .find_map(|s| Self::from_segment(s))
            .unwrap_or(Self::Other)
    }
}

/// What happened to the model, taken from the last key segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventAction {
    Add,
    Update,
    Remove,
    Other(String),
}

impl EventAction {
    /// Derive the action from an event key
    pub fn from_key(key: &str) -> Self {
        let last = key.rsplit('.').next().unwrap_or_default();
        match last.to_ascii_lowercase().as_str() {
            "add" | "create" | "created" => Self::Add,
            "update" | "upd" | "updated" => Self::Update,
            "remove" | "delete" | "del" | "deleted" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this action signals a deletion
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Remove)
    }
}

/// A filterable attribute of an event
///
/// The set is closed: perspective definitions naming any other field are
/// rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    /// Subject absolute path (e.g. `Fellowship.Gondor.Minas Tirith`)
    SubjectName,
    /// Subject tags
    SubjectTagFilter,
    /// Aspect name
    #[serde(alias = "aspectFilter")]
    AspectName,
    /// Aspect tags
    AspectTagFilter,
    /// Sample status (e.g. `OK`, `Critical`)
    StatusFilter,
    /// Subject subtree: the subject path equals a value or descends from it
    RootSubject,
}

impl FilterField {
    pub const ALL: [FilterField; 6] = [
        FilterField::SubjectName,
        FilterField::SubjectTagFilter,
        FilterField::AspectName,
        FilterField::AspectTagFilter,
        FilterField::StatusFilter,
        FilterField::RootSubject,
    ];

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubjectName => "subjectName",
            Self::SubjectTagFilter => "subjectTagFilter",
            Self::AspectName => "aspectName",
            Self::AspectTagFilter => "aspectTagFilter",
            Self::StatusFilter => "statusFilter",
            Self::RootSubject => "rootSubject",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter spec for a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    /// `true`: only matching values pass. `false`: matching values are excluded.
    #[serde(default = "default_include_mode")]
    pub include_mode: bool,

    /// Allowed or excluded values; `*` and `?` wildcards are honoured
    #[serde(default)]
    pub values: BTreeSet<String>,
}

fn default_include_mode() -> bool {
    true
}

impl FieldFilter {
    /// Only events whose field matches one of `values` pass
    pub fn include<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_mode: true,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Events whose field matches one of `values` are dropped
    pub fn exclude<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_mode: false,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Filter set of one namespace (field → filter spec)
///
/// An empty set is a firehose subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<FilterField, FieldFilter>);

impl Filters {
    /// Create an empty (firehose) filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter for a field
    pub fn with(mut self, field: FilterField, filter: FieldFilter) -> Self {
        self.0.insert(field, filter);
        self
    }

    pub fn get(&self, field: FilterField) -> Option<&FieldFilter> {
        self.0.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &FieldFilter)> {
        self.0.iter().map(|(field, filter)| (*field, filter))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a filter set from JSON, rejecting unknown fields
    pub fn from_json(namespace: &str, value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| RealtimeError::invalid_filter(namespace, e.to_string()))
    }

    /// Check that no include-mode filter has an empty value set
    pub fn validate(&self, namespace: &str) -> Result<()> {
        for (field, filter) in self.iter() {
            if filter.include_mode && filter.values.is_empty() {
                return Err(RealtimeError::invalid_filter(
                    namespace,
                    format!("include filter on '{}' has no values", field),
                ));
            }
        }
        Ok(())
    }
}

impl FromIterator<(FilterField, FieldFilter)> for Filters {
    fn from_iter<T: IntoIterator<Item = (FilterField, FieldFilter)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Perspective definition carried by a namespace-initialize control event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveDefinition {
    /// Namespace identifier the client joins
    pub namespace_id: String,

    /// Filters scoping the events this namespace receives
    #[serde(default)]
    pub filters: Filters,
}

impl PerspectiveDefinition {
    /// Parse a perspective definition from a control payload
    ///
    /// The definition may sit at the payload root or under `new`.
    pub fn from_payload(key: &str, payload: &serde_json::Value) -> Result<Self> {
        let body = payload.get("new").unwrap_or(payload);
        if !body.is_object() {
            return Err(RealtimeError::malformed(
                key,
                "perspective definition is not an object",
            ));
        }

        let def: PerspectiveDefinition = serde_json::from_value(body.clone())
            .map_err(|e| RealtimeError::malformed(key, format!("bad perspective: {}", e)))?;

        if def.namespace_id.is_empty() {
            return Err(RealtimeError::malformed(key, "namespaceId is empty"));
        }
        Ok(def)
    }
}

/// A raw `(key, payload)` pair as published on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub key: String,
    pub payload: serde_json::Value,
}

impl RawEvent {
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}
