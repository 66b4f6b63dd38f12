//! Import intake: resolve decoded rows against the schemas, validate them,
//! and reconcile them with live data.
//!
//! The pass is split in two so that rows can be shown to the user while
//! live collections are still loading:
//!
//! 1. [`prepare_rows`] resolves headers and validates cells. It needs only
//!    the schemas.
//! 2. [`reconcile`] builds the [`Summary`] from prepared rows and a live
//!    snapshot. It never mutates its inputs, so running it twice on the same
//!    inputs yields the same result.

pub mod coerce;
pub mod mapping;
pub mod reconcile;
pub mod relationship;
pub mod row;
pub mod summary;
pub mod validate;
pub mod value;

use std::collections::HashMap;

use serde_json::Value;

use crate::live::LiveSnapshot;
use crate::schema_index::SchemaIndex;
use crate::tabular::RawRow;
use crate::types::{set_path, Record};

pub use mapping::AttributeMapping;
pub use row::{Diagnostic, ImportedRow, RowValidation, Severity, ValidationSummary};
pub use summary::{ChangeKind, EntityChanges, NoChangeEntry, Summary};
pub use value::{FieldValue, ImportRecord, PendingReference, RelationRef, RelationshipValue, Tag};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Live data for {0} is still loading")]
    LiveDataNotReady(String),

    #[error("Live data for {schema} could not be loaded: {message}")]
    LiveDataUnavailable { schema: String, message: String },
}

/// Rows with header resolution and cell validation applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedImport {
    pub rows: Vec<ImportedRow>,
    pub mappings: Vec<AttributeMapping>,
}

impl PreparedImport {
    /// Schemas whose live data reconciliation reads: every mapped schema and
    /// every target of a mapped relationship.
    pub fn relevant_schemas(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for mapping in &self.mappings {
            let target = mapping
                .attribute
                .rel_entity
                .as_ref()
                .filter(|_| mapping.attribute.is_relationship());
            for name in std::iter::once(&mapping.schema_name).chain(target) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    pub fn has_errors(&self) -> bool {
        self.rows.iter().any(|r| r.validation.has_errors())
    }
}

/// Result of a full intake pass.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeOutcome {
    /// Prepared rows plus reconciliation diagnostics.
    pub rows: Vec<ImportedRow>,
    pub summary: Summary,
}

/// Resolve headers and validate every mapped cell of `raw_rows`.
pub fn prepare_rows(raw_rows: &[RawRow], index: &SchemaIndex<'_>) -> PreparedImport {
    let mut rows: Vec<ImportedRow> = raw_rows
        .iter()
        .enumerate()
        .map(|(i, cells)| ImportedRow::new(i, cells.clone()))
        .collect();

    let mappings = mapping::resolve_attributes(&mut rows, index);
    for row in rows.iter_mut() {
        validate_cells(row, &mappings);
    }

    PreparedImport { rows, mappings }
}

fn validate_cells(row: &mut ImportedRow, mappings: &[AttributeMapping]) {
    // Raw values per schema, for conditional requirements.
    let mut sources: HashMap<&str, Record> = HashMap::new();
    for mapping in mappings.iter().filter(|m| m.is_direct()) {
        if let Some(raw) = row.value(&mapping.import_raw_header) {
            set_path(
                sources.entry(mapping.schema_name.as_str()).or_default(),
                &mapping.attribute.name,
                Value::String(raw.to_string()),
            );
        }
    }

    let mut found: Vec<(String, String)> = Vec::new();
    for mapping in mappings {
        let Some(raw) = row.cells.get(&mapping.import_raw_header) else {
            continue;
        };
        let required = sources
            .get(mapping.schema_name.as_str())
            .is_some_and(|source| mapping.attribute.is_required_for(source))
            || mapping.attribute.required;
        for message in validate::validate_value(&mapping.attribute, raw.trim(), required) {
            found.push((mapping.import_raw_header.clone(), message));
        }
    }

    for (header, message) in found {
        row.validation.push(Severity::Error, header, message);
    }
}

/// Reconcile prepared rows against `live`.
///
/// Refuses while any relevant live collection is loading or failed, so that
/// relationships are never resolved against partial data.
pub fn reconcile(
    prepared: &PreparedImport,
    index: &SchemaIndex<'_>,
    live: &LiveSnapshot,
) -> Result<IntakeOutcome, IntakeError> {
    live.ensure_ready(&prepared.relevant_schemas())?;

    let mut rows = prepared.rows.clone();
    let summary = reconcile::build_summary(&mut rows, &prepared.mappings, index, live);
    Ok(IntakeOutcome { rows, summary })
}

/// Prepare and reconcile in one call.
pub fn run_intake(
    raw_rows: &[RawRow],
    index: &SchemaIndex<'_>,
    live: &LiveSnapshot,
) -> Result<IntakeOutcome, IntakeError> {
    reconcile(&prepare_rows(raw_rows, index), index, live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::EntityCollection;
    use crate::schema_index::fixtures::migration_schemas;
    use assert_matches::assert_matches;

    fn raw(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn relevant_schemas_include_relationship_targets() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        let prepared = prepare_rows(&[raw(&[("server_name", "s1"), ("app_name", "a1")])], &index);
        assert_eq!(
            prepared.relevant_schemas(),
            vec!["server", "application", "database"]
        );
    }

    #[test]
    fn cell_errors_are_attached_during_prepare() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        let prepared = prepare_rows(
            &[raw(&[("server_name", "s1"), ("server_os_family", "beos")])],
            &index,
        );
        assert!(prepared.has_errors());
        assert_eq!(prepared.rows[0].validation.errors[0].attribute, "server_os_family");
    }

    #[test]
    fn conditional_requirement_uses_row_values() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        let prepared = prepare_rows(
            &[raw(&[("server_name", "s1"), ("r_type", "Rehost"), ("instanceType", "  ")])],
            &index,
        );
        let errors = &prepared.rows[0].validation.errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attribute, "instanceType");
        assert_eq!(errors[0].error, validate::REQUIRED_MESSAGE);
    }

    #[test]
    fn loading_target_collection_refuses_reconcile() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        let live = LiveSnapshot::new().with("wave", EntityCollection::loading());
        let result = run_intake(&[raw(&[("app_name", "a"), ("wave_name", "w")])], &index, &live);
        assert_matches!(result, Err(IntakeError::LiveDataNotReady(s)) if s == "wave");
    }
}
