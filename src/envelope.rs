//! Event envelope: the normalized form of one change notification
//!
//! `Envelope::parse` validates the raw `(key, payload)` pair published by a
//! backend worker and exposes the attributes the matcher filters on. Each
//! attribute is read from a fixed list of field paths chosen by the
//! envelope's `SubjectKind`.

use crate::error::{RealtimeError, Result};
use crate::types::{EventAction, FilterField, SubjectKind};
use serde_json::{Map, Value};

/// Field paths tried in order for each attribute of a given kind
struct FieldPaths {
    subject_name: &'static [&'static str],
    subject_tags: &'static [&'static str],
    aspect_name: &'static [&'static str],
    aspect_tags: &'static [&'static str],
    status: &'static [&'static str],
}

static SAMPLE_PATHS: FieldPaths = FieldPaths {
    subject_name: &["subjectName", "absolutePath", "subject.absolutePath"],
    subject_tags: &["subjectTags", "subject.tags"],
    aspect_name: &["aspectName", "aspect.name"],
    aspect_tags: &["aspectTags", "aspect.tags"],
    status: &["status"],
};

static SUBJECT_PATHS: FieldPaths = FieldPaths {
    subject_name: &["absolutePath", "subjectName", "name"],
    subject_tags: &["tags", "subjectTags"],
    aspect_name: &[],
    aspect_tags: &[],
    status: &["status"],
};

static ASPECT_PATHS: FieldPaths = FieldPaths {
    subject_name: &[],
    subject_tags: &[],
    aspect_name: &["name", "aspectName"],
    aspect_tags: &["tags", "aspectTags"],
    status: &[],
};

static GENERIC_PATHS: FieldPaths = FieldPaths {
    subject_name: &["subjectName", "absolutePath"],
    subject_tags: &["subjectTags"],
    aspect_name: &["aspectName"],
    aspect_tags: &["aspectTags"],
    status: &["status"],
};

/// Separator between subject path and aspect name in a sample name
const SAMPLE_NAME_SEPARATOR: char = '|';

/// A validated change notification
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    key: String,
    kind: SubjectKind,
    action: EventAction,
    new: Option<Value>,
    old: Option<Value>,
    /// Identifier-only payload of a deletion signal carrying no snapshots
    identifier: Option<Value>,
}

impl Envelope {
    /// Validate a raw `(key, payload)` pair
    ///
    /// The payload must be a JSON object containing `new`, unless the key
    /// denotes a removal, in which case `old` or a bare identifier object is
    /// accepted instead.
    pub fn parse(key: impl Into<String>, payload: Value) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(RealtimeError::malformed(&key, "event key is empty"));
        }

        let Value::Object(mut map) = payload else {
            return Err(RealtimeError::malformed(&key, "payload is not an object"));
        };

        let kind = SubjectKind::from_key(&key);
        let action = EventAction::from_key(&key);
        let new = map.remove("new").filter(|v| !v.is_null());
        let old = map.remove("old").filter(|v| !v.is_null());

        let identifier = match (&new, &old) {
            (Some(_), _) => None,
            (None, Some(_)) if action.is_removal() => None,
            (None, None) if action.is_removal() && !map.is_empty() => Some(Value::Object(map)),
            _ => {
                return Err(RealtimeError::malformed(
                    &key,
                    "payload has no 'new' snapshot",
                ))
            }
        };

        Ok(Self {
            key,
            kind,
            action,
            new,
            old,
            identifier,
        })
    }

    /// Event key, used verbatim as the outbound event name
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn action(&self) -> &EventAction {
        &self.action
    }

    /// Post-change snapshot
    pub fn new_state(&self) -> Option<&Value> {
        self.new.as_ref()
    }

    /// Pre-change snapshot
    pub fn old_state(&self) -> Option<&Value> {
        self.old.as_ref()
    }

    /// Whether this is a deletion signal without a post-change snapshot
    pub fn is_deletion_signal(&self) -> bool {
        self.new.is_none()
    }

    /// Object the filterable attributes are read from
    fn subject(&self) -> Option<&Map<String, Value>> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .or(self.identifier.as_ref())
            .and_then(Value::as_object)
    }

    fn paths(&self) -> &'static FieldPaths {
        match self.kind {
            SubjectKind::Sample => &SAMPLE_PATHS,
            SubjectKind::Subject => &SUBJECT_PATHS,
            SubjectKind::Aspect => &ASPECT_PATHS,
            SubjectKind::Perspective | SubjectKind::Other => &GENERIC_PATHS,
        }
    }

    /// Sample name split into (subject path, aspect name)
    fn sample_name_parts(&self) -> Option<(&str, &str)> {
        if self.kind != SubjectKind::Sample {
            return None;
        }
        self.subject()?
            .get("name")?
            .as_str()?
            .split_once(SAMPLE_NAME_SEPARATOR)
    }

    /// Subject absolute path
    pub fn subject_name(&self) -> Option<&str> {
        let subject = self.subject()?;
        first_str(subject, self.paths().subject_name)
            .or_else(|| self.sample_name_parts().map(|(subject, _)| subject))
    }

    pub fn subject_tags(&self) -> Vec<&str> {
        self.subject()
            .map(|s| first_str_list(s, self.paths().subject_tags))
            .unwrap_or_default()
    }

    pub fn aspect_name(&self) -> Option<&str> {
        let subject = self.subject()?;
        first_str(subject, self.paths().aspect_name)
            .or_else(|| self.sample_name_parts().map(|(_, aspect)| aspect))
    }

    pub fn aspect_tags(&self) -> Vec<&str> {
        self.subject()
            .map(|s| first_str_list(s, self.paths().aspect_tags))
            .unwrap_or_default()
    }

    pub fn status(&self) -> Option<&str> {
        first_str(self.subject()?, self.paths().status)
    }

    /// Values of a filter field; empty when the event lacks the attribute
    pub fn values(&self, field: FilterField) -> Vec<&str> {
        match field {
            FilterField::SubjectName | FilterField::RootSubject => {
                self.subject_name().into_iter().collect()
            }
            FilterField::SubjectTagFilter => self.subject_tags(),
            FilterField::AspectName => self.aspect_name().into_iter().collect(),
            FilterField::AspectTagFilter => self.aspect_tags(),
            FilterField::StatusFilter => self.status().into_iter().collect(),
        }
    }

    /// Outbound payload: `{ <key>: { "new": ..., "old": ... } }`
    ///
    /// Identifier-only deletion signals are forwarded as `{ <key>: <identifier> }`.
    pub fn wire_payload(&self) -> Value {
        let body = match &self.identifier {
            Some(identifier) => identifier.clone(),
            None => {
                let mut body = Map::new();
                if let Some(new) = &self.new {
                    body.insert("new".to_string(), new.clone());
                }
                if let Some(old) = &self.old {
                    body.insert("old".to_string(), old.clone());
                }
                Value::Object(body)
            }
        };

        let mut wire = Map::new();
        wire.insert(self.key.clone(), body);
        Value::Object(wire)
    }
}

/// Resolve a dotted path such as `aspect.name`
fn lookup<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn first_str<'a>(object: &'a Map<String, Value>, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .find_map(|path| lookup(object, path).and_then(Value::as_str))
}

fn first_str_list<'a>(object: &'a Map<String, Value>, paths: &[&str]) -> Vec<&'a str> {
    paths
        .iter()
        .find_map(|path| lookup(object, path).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Envelope::parse("sample.update", json!([1, 2])).unwrap_err();
        assert!(matches!(err, RealtimeError::MalformedEvent { .. }));
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        let err = Envelope::parse("", json!({"new": {}})).unwrap_err();
        assert!(err.to_string().contains("key is empty"));
    }

    #[test]
    fn test_parse_requires_new_for_updates() {
        let err = Envelope::parse("sample.update", json!({"old": {"status": "OK"}})).unwrap_err();
        assert!(err.to_string().contains("'new'"));
    }

    #[test]
    fn test_parse_deletion_signal() {
        let env = Envelope::parse("subject.remove", json!({"id": "s-1", "absolutePath": "a.b"}))
            .unwrap();
        assert!(env.is_deletion_signal());
        assert_eq!(env.subject_name(), Some("a.b"));
        assert_eq!(
            env.wire_payload(),
            json!({"subject.remove": {"id": "s-1", "absolutePath": "a.b"}})
        );

        let env = Envelope::parse("subject.remove", json!({"old": {"absolutePath": "a.c"}}))
            .unwrap();
        assert_eq!(env.subject_name(), Some("a.c"));

        assert!(Envelope::parse("subject.remove", json!({})).is_err());
    }

    #[test]
    fn test_sample_accessors() {
        let env = Envelope::parse(
            "refocus.internal.realtime.sample.update",
            json!({"new": {
                "name": "Fellowship.Gondor|Uptime",
                "status": "Critical",
                "subject": {"absolutePath": "Fellowship.Gondor", "tags": ["city", "west"]},
                "aspect": {"name": "Uptime", "tags": ["infra"]}
            }}),
        )
        .unwrap();

        assert_eq!(env.kind(), SubjectKind::Sample);
        assert_eq!(env.subject_name(), Some("Fellowship.Gondor"));
        assert_eq!(env.aspect_name(), Some("Uptime"));
        assert_eq!(env.subject_tags(), vec!["city", "west"]);
        assert_eq!(env.aspect_tags(), vec!["infra"]);
        assert_eq!(env.status(), Some("Critical"));
    }

    #[test]
    fn test_sample_name_fallback() {
        let env = Envelope::parse(
            "sample.add",
            json!({"new": {"name": "Node1|cpu", "status": "OK"}}),
        )
        .unwrap();
        assert_eq!(env.subject_name(), Some("Node1"));
        assert_eq!(env.aspect_name(), Some("cpu"));
        assert!(env.subject_tags().is_empty());
    }

    #[test]
    fn test_subject_accessors() {
        let env = Envelope::parse(
            "subject.update",
            json!({"new": {"absolutePath": "Root.Child", "name": "Child", "tags": ["t1"]},
                   "old": {"absolutePath": "Root.Child", "tags": []}}),
        )
        .unwrap();
        assert_eq!(env.subject_name(), Some("Root.Child"));
        assert_eq!(env.subject_tags(), vec!["t1"]);
        assert_eq!(env.aspect_name(), None);
        assert_eq!(env.values(FilterField::AspectTagFilter), Vec::<&str>::new());
    }

    #[test]
    fn test_aspect_accessors() {
        let env = Envelope::parse("aspect.update", json!({"new": {"name": "Latency", "tags": ["net"]}}))
            .unwrap();
        assert_eq!(env.aspect_name(), Some("Latency"));
        assert_eq!(env.aspect_tags(), vec!["net"]);
        assert_eq!(env.subject_name(), None);
    }

    #[test]
    fn test_values_by_field() {
        let env = Envelope::parse(
            "sample.update",
            json!({"new": {"subjectName": "Node1", "status": "OK"}}),
        )
        .unwrap();
        assert_eq!(env.values(FilterField::SubjectName), vec!["Node1"]);
        assert_eq!(env.values(FilterField::RootSubject), vec!["Node1"]);
        assert_eq!(env.values(FilterField::StatusFilter), vec!["OK"]);
        assert!(env.values(FilterField::SubjectTagFilter).is_empty());
    }

    #[test]
    fn test_wire_payload_shape() {
        let env = Envelope::parse(
            "sample.update",
            json!({"new": {"status": "OK"}, "old": {"status": "Warning"}}),
        )
        .unwrap();
        assert_eq!(
            env.wire_payload(),
            json!({"sample.update": {"new": {"status": "OK"}, "old": {"status": "Warning"}}})
        );

        let env = Envelope::parse("sample.add", json!({"new": {"status": "OK"}})).unwrap();
        assert_eq!(env.wire_payload(), json!({"sample.add": {"new": {"status": "OK"}}}));
    }
}
