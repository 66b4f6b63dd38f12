//! Snapshot of the live entity collections used during one intake pass.

use indexmap::IndexMap;

use crate::intake::IntakeError;
use crate::types::Record;

/// One schema's records as loaded by the surrounding application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCollection {
    pub data: Vec<Record>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl EntityCollection {
    pub fn loaded(data: Vec<Record>) -> Self {
        Self {
            data,
            is_loading: false,
            error: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            data: Vec::new(),
            is_loading: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            is_loading: false,
            error: Some(error.into()),
        }
    }
}

/// Read-only copy of the live collections, taken once at pass start.
///
/// A schema with no collection in the snapshot is treated as loaded and
/// empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    collections: IndexMap<String, EntityCollection>,
}

impl LiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema_name: impl Into<String>, collection: EntityCollection) {
        self.collections.insert(schema_name.into(), collection);
    }

    /// Builder form of [`LiveSnapshot::insert`].
    pub fn with(mut self, schema_name: impl Into<String>, collection: EntityCollection) -> Self {
        self.insert(schema_name, collection);
        self
    }

    pub fn collection(&self, schema_name: &str) -> Option<&EntityCollection> {
        self.collections.get(schema_name)
    }

    pub fn records(&self, schema_name: &str) -> &[Record] {
        self.collections
            .get(schema_name)
            .map(|c| c.data.as_slice())
            .unwrap_or_default()
    }

    /// Fail if any of `schema_names` is still loading or failed to load.
    pub fn ensure_ready<S: AsRef<str>>(&self, schema_names: &[S]) -> Result<(), IntakeError> {
        for name in schema_names {
            let name = name.as_ref();
            let Some(collection) = self.collections.get(name) else {
                continue;
            };
            if let Some(error) = &collection.error {
                return Err(IntakeError::LiveDataUnavailable {
                    schema: name.to_string(),
                    message: error.clone(),
                });
            }
            if collection.is_loading {
                return Err(IntakeError::LiveDataNotReady(name.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn missing_collections_read_as_empty() {
        let snapshot = LiveSnapshot::new();
        assert!(snapshot.records("wave").is_empty());
        assert!(snapshot.ensure_ready(&["wave"]).is_ok());
    }

    #[test]
    fn loading_and_failed_collections_are_not_ready() {
        let snapshot = LiveSnapshot::new()
            .with("wave", EntityCollection::loading())
            .with("server", EntityCollection::failed("403 Forbidden"))
            .with(
                "application",
                EntityCollection::loaded(vec![json!({"app_name": "a"})
                    .as_object()
                    .cloned()
                    .unwrap()]),
            );

        assert_eq!(snapshot.records("application").len(), 1);
        assert!(snapshot.ensure_ready(&["application"]).is_ok());
        assert_matches!(
            snapshot.ensure_ready(&["application", "wave"]),
            Err(IntakeError::LiveDataNotReady(s)) if s == "wave"
        );
        assert_matches!(
            snapshot.ensure_ready(&["server"]),
            Err(IntakeError::LiveDataUnavailable { schema, .. }) if schema == "server"
        );
    }
}
