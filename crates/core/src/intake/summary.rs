//! Reconciliation output handed to the commit step.

use indexmap::IndexMap;
use serde::Serialize;

use super::mapping::AttributeMapping;
use super::value::ImportRecord;

/// Which backend call an [`ImportRecord`] needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    Create,
    Update,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoChangeEntry {
    #[serde(rename = "_name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityChanges {
    #[serde(rename = "Create")]
    pub create: Vec<ImportRecord>,
    #[serde(rename = "Update")]
    pub update: Vec<ImportRecord>,
    #[serde(rename = "NoChange")]
    pub no_change: Vec<NoChangeEntry>,
}

impl EntityChanges {
    pub fn records(&self, kind: ChangeKind) -> &[ImportRecord] {
        match kind {
            ChangeKind::Create => &self.create,
            ChangeKind::Update => &self.update,
        }
    }

    pub fn records_mut(&mut self, kind: ChangeKind) -> &mut Vec<ImportRecord> {
        match kind {
            ChangeKind::Create => &mut self.create,
            ChangeKind::Update => &mut self.update,
        }
    }

    /// Whether `business_key` (case-insensitive) is already classified.
    pub fn contains_key(&self, business_key: &str) -> bool {
        let key = business_key.to_lowercase();
        self.create
            .iter()
            .chain(&self.update)
            .any(|r| r.business_key.to_lowercase() == key)
            || self.no_change.iter().any(|e| e.name.to_lowercase() == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Per-schema changes in discovery order.
    pub entities: IndexMap<String, EntityChanges>,
    pub has_updates: bool,
    pub attribute_mappings: Vec<AttributeMapping>,
}

impl Summary {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.entities.values().map(|e| e.records(kind).len()).sum()
    }

    pub fn no_change_count(&self) -> usize {
        self.entities.values().map(|e| e.no_change.len()).sum()
    }

    /// Records that need a backend call.
    pub fn pending_changes(&self) -> usize {
        self.count(ChangeKind::Create) + self.count(ChangeKind::Update)
    }

    pub(crate) fn refresh_has_updates(&mut self) {
        self.has_updates = self.pending_changes() > 0;
    }

    /// Resolve pending references in every Create and Update record to
    /// records just created in `rel_entity`. Returns how many were replaced.
    pub fn backfill(&mut self, rel_entity: &str, new_items: &[crate::types::Record]) -> usize {
        self.entities
            .values_mut()
            .flat_map(|e| e.create.iter_mut().chain(e.update.iter_mut()))
            .map(|record| record.backfill(rel_entity, new_items))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::value::{FieldValue, RelationRef, RelationshipValue};
    use crate::schema::RelationshipTarget;
    use serde_json::json;

    fn record(schema: &str, key: &str) -> ImportRecord {
        ImportRecord {
            schema_name: schema.to_string(),
            key_attribute: format!("{schema}_name"),
            business_key: key.to_string(),
            existing_id: None,
            id_attribute: None,
            import_rows: vec![0],
            values: IndexMap::new(),
        }
    }

    #[test]
    fn counts_and_has_updates() {
        let mut summary = Summary::default();
        summary.refresh_has_updates();
        assert!(!summary.has_updates);

        let wave = summary.entities.entry("wave".to_string()).or_default();
        wave.create.push(record("wave", "Wave1"));
        wave.no_change.push(NoChangeEntry { name: "Wave0".to_string() });
        summary.refresh_has_updates();

        assert!(summary.has_updates);
        assert_eq!(summary.count(ChangeKind::Create), 1);
        assert_eq!(summary.no_change_count(), 1);
        assert!(summary.entities["wave"].contains_key("WAVE1"));
        assert!(summary.entities["wave"].contains_key("wave0"));
    }

    #[test]
    fn serializes_with_summary_field_names() {
        let mut summary = Summary::default();
        summary
            .entities
            .entry("wave".to_string())
            .or_default()
            .no_change
            .push(NoChangeEntry { name: "W".to_string() });
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["hasUpdates"], json!(false));
        assert_eq!(value["entities"]["wave"]["NoChange"][0]["_name"], json!("W"));
        assert!(value["attributeMappings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn backfill_reaches_every_schema() {
        let mut app = record("application", "App1");
        app.values.insert(
            "wave_id".to_string(),
            FieldValue::Relationship(RelationshipValue {
                target: RelationshipTarget {
                    rel_entity: "wave".to_string(),
                    rel_key: "wave_id".to_string(),
                    rel_display_attribute: "wave_name".to_string(),
                },
                multi: false,
                refs: vec![RelationRef::Pending("Wave1".to_string())],
            }),
        );
        let mut summary = Summary::default();
        summary
            .entities
            .entry("application".to_string())
            .or_default()
            .update
            .push(app);

        let created = json!({"wave_id": "5", "wave_name": "Wave1"});
        assert_eq!(summary.backfill("wave", &[created.as_object().cloned().unwrap()]), 1);
        assert!(!summary.entities["application"].update[0].has_pending());
    }
}
