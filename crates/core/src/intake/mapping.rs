//! Resolution of raw column headers to schema attributes.

use std::collections::HashMap;

use serde::Serialize;

use crate::schema::Attribute;
use crate::schema_index::{AttributeMatch, SchemaIndex};

use super::row::{ImportedRow, Severity};

/// One raw header resolved to one (schema, attribute) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeMapping {
    pub attribute: Attribute,
    pub schema_name: String,
    pub import_raw_header: String,
    /// Header with any `[schema]` qualifier removed.
    pub lookup_attribute_name: String,
    pub lookup_schema_name: Option<String>,
}

impl AttributeMapping {
    fn from_match(header: &str, found: &AttributeMatch<'_>) -> Option<Self> {
        Some(Self {
            attribute: found.attribute?.clone(),
            schema_name: found.schema_name?.to_string(),
            import_raw_header: header.to_string(),
            lookup_attribute_name: found.lookup_attribute_name.clone(),
            lookup_schema_name: found.lookup_schema_name.clone(),
        })
    }

    /// `true` when the header names the attribute itself rather than a
    /// relationship's display attribute.
    pub fn is_direct(&self) -> bool {
        self.lookup_attribute_name == self.attribute.name
    }
}

/// Split a `[schema]key` header into its schema hint and key.
///
/// Anything else, including `[]key` and `[schema]`, is returned whole as an
/// unqualified key.
pub fn split_header(header: &str) -> (Option<&str>, &str) {
    if let Some(rest) = header.strip_prefix('[') {
        if let Some((schema, key)) = rest.split_once(']') {
            if !schema.is_empty() && !key.is_empty() {
                return (Some(schema), key);
            }
        }
    }
    (None, header)
}

/// Resolve every header of every row and annotate rows whose headers are
/// ambiguous or unknown.
///
/// Returns the mappings in first-seen order, at most one per
/// `(import_raw_header, schema_name)`.
pub fn resolve_attributes(rows: &mut [ImportedRow], index: &SchemaIndex<'_>) -> Vec<AttributeMapping> {
    let mut mappings: Vec<AttributeMapping> = Vec::new();
    let mut resolved: HashMap<String, Vec<AttributeMatch<'_>>> = HashMap::new();

    for row in rows.iter_mut() {
        let headers: Vec<String> = row.cells.keys().cloned().collect();
        for header in headers {
            let matches = resolved.entry(header.clone()).or_insert_with(|| {
                let (hint, key) = split_header(&header);
                index.lookup(key, hint)
            });

            for found in matches.iter() {
                let Some(mapping) = AttributeMapping::from_match(&header, found) else {
                    continue;
                };
                let seen = mappings.iter().any(|m| {
                    m.import_raw_header == mapping.import_raw_header
                        && m.schema_name == mapping.schema_name
                });
                if !seen {
                    mappings.push(mapping);
                }
            }

            let schemas: Vec<&str> = matches.iter().filter_map(|m| m.schema_name).collect();
            match schemas.len() {
                0 => row.validation.push(
                    Severity::Warning,
                    header.as_str(),
                    format!("'{header}' is not an attribute of any schema, value will be ignored"),
                ),
                1 => {}
                _ => row.validation.push(
                    Severity::Informational,
                    header.as_str(),
                    format!(
                        "'{header}' matches attributes in multiple schemas ({}), value will be applied to each",
                        schemas.join(", ")
                    ),
                ),
            }
        }
    }

    mappings
}
