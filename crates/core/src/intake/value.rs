//! Typed attribute values assembled from import rows.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::schema::RelationshipTarget;
use crate::types::{set_path, text_at, value_as_text, Record, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// A reference to a target record: either its id, or the display name of a
/// record this import is expected to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RelationRef {
    Resolved(RecordId),
    Pending(String),
}

impl RelationRef {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Id, or display name while pending.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(id) => id,
            Self::Pending(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipValue {
    pub target: RelationshipTarget,
    pub multi: bool,
    pub refs: Vec<RelationRef>,
}

impl RelationshipValue {
    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.refs.iter().filter_map(|r| match r {
            RelationRef::Pending(name) => Some(name.as_str()),
            RelationRef::Resolved(_) => None,
        })
    }

    /// Replace pending references to `display` (case-insensitive) with `id`.
    /// Returns how many were replaced.
    pub fn resolve_pending(&mut self, rel_entity: &str, display: &str, id: &str) -> usize {
        if self.target.rel_entity != rel_entity {
            return 0;
        }
        let display = display.to_lowercase();
        let mut replaced = 0;
        for r in self.refs.iter_mut() {
            if let RelationRef::Pending(name) = r {
                if name.to_lowercase() == display {
                    *r = RelationRef::Resolved(id.to_string());
                    replaced += 1;
                }
            }
        }
        replaced
    }

    fn json_with(&self, render: impl Fn(&RelationRef) -> Option<Value>) -> Option<Value> {
        if self.multi {
            self.refs
                .iter()
                .map(render)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        } else {
            match self.refs.first() {
                Some(r) => render(r),
                None => Some(Value::Null),
            }
        }
    }

    /// Wire form, or `None` while any reference is pending.
    pub fn to_json(&self) -> Option<Value> {
        self.json_with(|r| match r {
            RelationRef::Resolved(id) => Some(Value::String(id.clone())),
            RelationRef::Pending(_) => None,
        })
    }

    /// Form used for required checks and display: pending references show
    /// their display name.
    pub fn view(&self) -> Value {
        self.json_with(|r| Some(Value::String(r.as_str().to_string())))
            .unwrap_or(Value::Null)
    }
}

/// A coerced attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Tags(Vec<Tag>),
    Bool(bool),
    Relationship(RelationshipValue),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Tags(tags) => tags.is_empty(),
            Self::Bool(_) => false,
            Self::Relationship(rel) => rel.refs.is_empty(),
        }
    }

    /// Wire form, or `None` for a relationship with pending references.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Relationship(rel) => rel.to_json(),
            other => Some(other.view()),
        }
    }

    pub fn view(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::Tags(tags) => Value::Array(
                tags.iter()
                    .map(|t| serde_json::json!({"key": t.key, "value": t.value}))
                    .collect(),
            ),
            Self::Bool(b) => Value::Bool(*b),
            Self::Relationship(rel) => rel.view(),
        }
    }

    /// Deep equality against a live value. Scalars compare by text so that
    /// `"42"` equals `42`; a pending relationship never matches.
    pub fn matches(&self, live: Option<&Value>) -> bool {
        let Some(new) = self.to_json() else {
            return false;
        };
        match live {
            Some(current) => json_equivalent(&new, current),
            None => crate::types::is_blank(Some(&new)),
        }
    }
}

fn json_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_equivalent(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_equivalent(v, w)))
        }
        (Value::Null, other) | (other, Value::Null) => crate::types::is_blank(Some(other)),
        _ => a == b || value_as_text(a).is_some_and(|t| value_as_text(b) == Some(t)),
    }
}

/// A reference that has not been resolved to an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    pub attribute: String,
    pub rel_entity: String,
    pub display_name: String,
}

impl std::fmt::Display for PendingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} references {} '{}' which has not been created",
            self.attribute, self.rel_entity, self.display_name
        )
    }
}

/// One logical record for one schema, keyed by its business key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub schema_name: String,
    pub key_attribute: String,
    pub business_key: String,
    /// Backend id of the live record for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_attribute: Option<String>,
    /// Rows that contributed to this record.
    pub import_rows: Vec<usize>,
    pub values: IndexMap<String, FieldValue>,
}

impl ImportRecord {
    /// The record with pending references shown by display name.
    pub fn view(&self) -> Record {
        let mut record = Record::new();
        for (name, value) in &self.values {
            set_path(&mut record, name, value.view());
        }
        record
    }

    /// The record to send to the backend. Fails on the first pending
    /// reference.
    pub fn payload(&self) -> Result<Record, PendingReference> {
        if let Some(pending) = self.pending_references().into_iter().next() {
            return Err(pending);
        }
        let mut record = Record::new();
        for (name, value) in &self.values {
            if let Some(json) = value.to_json() {
                set_path(&mut record, name, json);
            }
        }
        Ok(record)
    }

    pub fn pending_references(&self) -> Vec<PendingReference> {
        self.values
            .iter()
            .filter_map(|(name, value)| match value {
                FieldValue::Relationship(rel) => Some((name, rel)),
                _ => None,
            })
            .flat_map(|(name, rel)| {
                rel.pending_names().map(move |display| PendingReference {
                    attribute: name.clone(),
                    rel_entity: rel.target.rel_entity.clone(),
                    display_name: display.to_string(),
                })
            })
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.values.values().any(|v| match v {
            FieldValue::Relationship(rel) => rel.refs.iter().any(RelationRef::is_pending),
            _ => false,
        })
    }

    /// Resolve pending references to records just created in `rel_entity`.
    /// Returns how many references were replaced.
    pub fn backfill(&mut self, rel_entity: &str, new_items: &[Record]) -> usize {
        let mut replaced = 0;
        for value in self.values.values_mut() {
            let FieldValue::Relationship(rel) = value else {
                continue;
            };
            if rel.target.rel_entity != rel_entity {
                continue;
            }
            for item in new_items {
                let display = text_at(item, &rel.target.rel_display_attribute);
                let id = text_at(item, &rel.target.rel_key);
                if let (Some(display), Some(id)) = (display, id) {
                    replaced += rel.resolve_pending(rel_entity, &display, &id);
                }
            }
        }
        replaced
    }
}
