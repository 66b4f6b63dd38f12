//! Classification of import rows into Create / Update / NoChange.
//!
//! For each user schema with a mapped business key column, rows are grouped
//! by key (case-insensitive). A group whose rows disagree on any mapped
//! column is rejected as a mismatch. Every other group is assembled into one
//! [`ImportRecord`] and compared with the live record carrying the same key.

use indexmap::IndexMap;
use serde_json::Value;

use crate::live::LiveSnapshot;
use crate::schema::{Attribute, Schema};
use crate::schema_index::SchemaIndex;
use crate::types::{get_path, is_blank, set_path, text_at, Record};

use super::coerce::{coerce, Coercion};
use super::mapping::AttributeMapping;
use super::relationship::materialize;
use super::row::{ImportedRow, Severity};
use super::summary::{EntityChanges, NoChangeEntry, Summary};
use super::value::{FieldValue, ImportRecord};

/// Build the Summary for `rows`, appending mismatch, required-attribute and
/// reference diagnostics to them.
pub fn build_summary(
    rows: &mut [ImportedRow],
    mappings: &[AttributeMapping],
    index: &SchemaIndex<'_>,
    live: &LiveSnapshot,
) -> Summary {
    let mut summary = Summary {
        attribute_mappings: mappings.to_vec(),
        ..Default::default()
    };

    for schema in index.user_schemas() {
        let schema_mappings: Vec<&AttributeMapping> = mappings
            .iter()
            .filter(|m| m.schema_name == schema.schema_name)
            .collect();
        if schema_mappings.is_empty() {
            continue;
        }
        let Some(key_attribute) = schema.business_key_attribute() else {
            continue;
        };
        let key_headers: Vec<&str> = schema_mappings
            .iter()
            .filter(|m| m.is_direct() && m.attribute.name == key_attribute.name)
            .map(|m| m.import_raw_header.as_str())
            .collect();
        // Columns that only reference this schema, without its key, do not
        // describe records of it.
        if key_headers.is_empty() {
            continue;
        }

        let reconciler = SchemaReconciler {
            schema,
            key_attribute,
            key_headers: &key_headers,
            mappings: &schema_mappings,
            live,
        };
        let changes = reconciler.run(rows);
        summary.entities.insert(schema.schema_name.clone(), changes);
    }

    flag_dangling_references(&summary, rows);
    summary.refresh_has_updates();
    summary
}

struct SchemaReconciler<'a> {
    schema: &'a Schema,
    key_attribute: &'a Attribute,
    key_headers: &'a [&'a str],
    mappings: &'a [&'a AttributeMapping],
    live: &'a LiveSnapshot,
}

impl SchemaReconciler<'_> {
    fn run(&self, rows: &mut [ImportedRow]) -> EntityChanges {
        let mut changes = EntityChanges::default();

        for (key, group) in self.group_rows(rows) {
            if self.flag_mismatches(rows, &key, &group) {
                continue;
            }
            let record = self.assemble(rows, &key, &group);
            self.classify(rows, record, &mut changes);
        }

        changes
    }

    fn row_key<'r>(&self, row: &'r ImportedRow) -> Option<&'r str> {
        self.key_headers.iter().find_map(|h| row.value(h))
    }

    /// Row positions grouped by lower-cased key, keyed by the first
    /// spelling seen. Rows with values for this schema but no key are
    /// flagged and skipped.
    fn group_rows(&self, rows: &mut [ImportedRow]) -> Vec<(String, Vec<usize>)> {
        let mut groups: IndexMap<String, (String, Vec<usize>)> = IndexMap::new();
        let mut keyless = Vec::new();

        for (pos, row) in rows.iter().enumerate() {
            match self.row_key(row) {
                Some(key) => {
                    groups
                        .entry(key.to_lowercase())
                        .or_insert_with(|| (key.to_string(), Vec::new()))
                        .1
                        .push(pos);
                }
                None => {
                    // Reference columns describe other schemas' records.
                    let has_values = self
                        .mappings
                        .iter()
                        .filter(|m| m.is_direct())
                        .any(|m| row.value(&m.import_raw_header).is_some());
                    if has_values {
                        keyless.push(pos);
                    }
                }
            }
        }

        for pos in keyless {
            rows[pos].validation.push(
                Severity::Warning,
                self.key_attribute.name.as_str(),
                format!(
                    "no {} supplied, {} values in this row will be ignored",
                    self.key_attribute.name, self.schema.schema_name
                ),
            );
        }

        groups.into_values().collect()
    }

    /// Flag every mapped column whose values differ across the group.
    /// Returns `true` when the key must be excluded.
    fn flag_mismatches(&self, rows: &mut [ImportedRow], key: &str, group: &[usize]) -> bool {
        if group.len() < 2 {
            return false;
        }

        let mut mismatched = false;
        for mapping in self.mappings {
            let header = mapping.import_raw_header.as_str();
            if self.key_headers.contains(&header) {
                continue;
            }
            let differs = {
                let mut distinct: Vec<&str> = Vec::new();
                for &pos in group {
                    if let Some(value) = rows[pos].value(header) {
                        if !distinct.contains(&value) {
                            distinct.push(value);
                        }
                    }
                }
                distinct.len() > 1
            };
            if differs {
                mismatched = true;
                for &pos in group {
                    rows[pos].validation.push(
                        Severity::Error,
                        header,
                        format!(
                            "{header} cannot be different for the same {} '{key}'",
                            self.schema.schema_name
                        ),
                    );
                }
            }
        }
        mismatched
    }

    fn assemble(&self, rows: &[ImportedRow], key: &str, group: &[usize]) -> ImportRecord {
        let representative =
            |header: &str| group.iter().find_map(|&pos| rows[pos].value(header));

        let mut source = Record::new();
        for mapping in self.mappings.iter().filter(|m| m.is_direct()) {
            if let Some(raw) = representative(&mapping.import_raw_header) {
                set_path(&mut source, &mapping.attribute.name, Value::String(raw.to_string()));
            }
        }

        let mut values: IndexMap<String, FieldValue> = IndexMap::new();
        let (relationships, plain): (Vec<&&AttributeMapping>, Vec<&&AttributeMapping>) = self
            .mappings
            .iter()
            .partition(|m| m.attribute.is_relationship());

        for mapping in plain {
            let Some(raw) = representative(&mapping.import_raw_header) else {
                continue;
            };
            if let Coercion::Value(value) = coerce(&mapping.attribute, raw) {
                if !value.is_empty() {
                    values.entry(mapping.attribute.name.clone()).or_insert(value);
                }
            }
        }

        for mapping in relationships {
            let Some(raw) = representative(&mapping.import_raw_header) else {
                continue;
            };
            if let Some(rel) = materialize(mapping, raw, &source, self.live) {
                if !rel.refs.is_empty() {
                    values
                        .entry(mapping.attribute.name.clone())
                        .or_insert(FieldValue::Relationship(rel));
                }
            }
        }

        ImportRecord {
            schema_name: self.schema.schema_name.clone(),
            key_attribute: self.key_attribute.name.clone(),
            business_key: key.to_string(),
            existing_id: None,
            id_attribute: self.schema.id_attribute().map(|a| a.name.clone()),
            import_rows: group.iter().map(|&pos| rows[pos].import_row).collect(),
            values,
        }
    }

    fn classify(&self, rows: &mut [ImportedRow], mut record: ImportRecord, changes: &mut EntityChanges) {
        let wanted = record.business_key.to_lowercase();
        let existing = self
            .live
            .records(&self.schema.schema_name)
            .iter()
            .find(|r| {
                text_at(r, &self.key_attribute.name).is_some_and(|v| v.to_lowercase() == wanted)
            });

        let Some(current) = existing else {
            let missing = self.missing_required(&record.view());
            if missing.is_empty() {
                changes.create.push(record);
            } else {
                self.flag_missing(rows, &record, &missing);
            }
            return;
        };

        let diff: IndexMap<String, FieldValue> = record
            .values
            .iter()
            .filter(|(name, _)| **name != self.key_attribute.name && !name.starts_with('_'))
            .filter(|(name, value)| !value.matches(get_path(current, name)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if diff.is_empty() {
            changes.no_change.push(NoChangeEntry {
                name: record.business_key,
            });
            return;
        }

        let mut merged = current.clone();
        for (name, value) in &diff {
            set_path(&mut merged, name, value.view());
        }
        let missing = self.missing_required(&merged);
        if !missing.is_empty() {
            self.flag_missing(rows, &record, &missing);
            return;
        }

        let mut values = IndexMap::new();
        if let Some(key_value) = record.values.shift_remove(&self.key_attribute.name) {
            values.insert(self.key_attribute.name.clone(), key_value);
        }
        values.extend(diff);

        record.existing_id = record
            .id_attribute
            .as_deref()
            .and_then(|id_attribute| text_at(current, id_attribute));
        record.values = values;
        changes.update.push(record);
    }

    fn missing_required(&self, candidate: &Record) -> Vec<&Attribute> {
        self.schema
            .attributes
            .iter()
            .filter(|a| !a.system)
            .filter(|a| a.is_required_for(candidate))
            .filter(|a| is_blank(get_path(candidate, &a.name)))
            .collect()
    }

    fn flag_missing(&self, rows: &mut [ImportedRow], record: &ImportRecord, missing: &[&Attribute]) {
        for attribute in missing {
            let message = format!(
                "{} is required for {} '{}'",
                attribute.name, self.schema.schema_name, record.business_key
            );
            for row in rows
                .iter_mut()
                .filter(|r| record.import_rows.contains(&r.import_row))
            {
                row.validation
                    .push(Severity::Error, attribute.name.as_str(), message.as_str());
            }
        }
    }
}

/// Warn on records referencing a target that neither exists nor is
/// created by this import. Such records fail at commit.
fn flag_dangling_references(summary: &Summary, rows: &mut [ImportedRow]) {
    let created_by_import = |rel_entity: &str, display_attribute: &str, display: &str| {
        let wanted = display.to_lowercase();
        summary.entities.get(rel_entity).is_some_and(|changes| {
            changes.create.iter().any(|r| {
                text_at(&r.view(), display_attribute).is_some_and(|d| d.to_lowercase() == wanted)
            })
        })
    };

    let mut warnings: Vec<(Vec<usize>, String, String)> = Vec::new();
    for changes in summary.entities.values() {
        for record in changes.create.iter().chain(&changes.update) {
            for (name, value) in &record.values {
                let FieldValue::Relationship(rel) = value else {
                    continue;
                };
                for display in rel.pending_names() {
                    let target = &rel.target;
                    if !created_by_import(&target.rel_entity, &target.rel_display_attribute, display) {
                        warnings.push((
                            record.import_rows.clone(),
                            name.clone(),
                            format!(
                                "{} '{display}' does not exist and is not created by this import",
                                target.rel_entity
                            ),
                        ));
                    }
                }
            }
        }
    }

    for (import_rows, attribute, message) in warnings {
        for row in rows.iter_mut().filter(|r| import_rows.contains(&r.import_row)) {
            row.validation
                .push(Severity::Warning, attribute.as_str(), message.as_str());
        }
    }
}
