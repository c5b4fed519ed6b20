//! Predicate matcher: decides whether an envelope is relevant to a namespace
//!
//! A namespace matches when every filter field present in its filter set
//! passes (logical AND). Fields absent from the set impose no constraint,
//! so an empty filter set matches every event.
//!
//! Per field:
//! - include mode: at least one extracted value matches at least one
//!   filter value; an event with no value for the field is decided by
//!   [`EmptyValuePolicy`]
//! - exclude mode: the field fails if any extracted value matches any
//!   filter value
//!
//! Comparison is case-insensitive with `*`/`?` wildcards (see [`crate::wildcard`]).
//! `rootSubject` compares subject paths by subtree instead.

use crate::envelope::Envelope;
use crate::types::{FieldFilter, FilterField, Filters};
use crate::wildcard;
use serde::{Deserialize, Serialize};

/// Outcome of an include-mode filter when the event carries no value for
/// the filtered field (e.g. filtering on tags for an untagged subject)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyValuePolicy {
    /// The field fails; the namespace does not receive the event
    #[default]
    Reject,
    /// The field passes as if unconstrained
    Accept,
}

/// Check whether `envelope` passes every filter in `filters`
pub fn matches(envelope: &Envelope, filters: &Filters, policy: EmptyValuePolicy) -> bool {
    filters
        .iter()
        .all(|(field, filter)| field_passes(envelope, field, filter, policy))
}

fn field_passes(
    envelope: &Envelope,
    field: FilterField,
    filter: &FieldFilter,
    policy: EmptyValuePolicy,
) -> bool {
    let values = envelope.values(field);
    let any_match = values
        .iter()
        .any(|value| filter.values.iter().any(|pattern| value_matches(field, pattern, value)));

    if filter.include_mode {
        if values.is_empty() {
            return policy == EmptyValuePolicy::Accept;
        }
        any_match
    } else {
        !any_match
    }
}

fn value_matches(field: FilterField, pattern: &str, value: &str) -> bool {
    match field {
        FilterField::RootSubject => in_subtree(pattern, value),
        _ if !wildcard::has_wildcard(pattern) => pattern.to_lowercase() == value.to_lowercase(),
        _ => wildcard::matches(pattern, value),
    }
}

/// Whether `path` equals `root` or lies beneath it (`root.` prefix)
fn in_subtree(root: &str, path: &str) -> bool {
    let root = root.to_lowercase();
    let path = path.to_lowercase();
    path == root
        || path
            .strip_prefix(&root)
            .is_some_and(|rest| rest.starts_with('.'))
}
