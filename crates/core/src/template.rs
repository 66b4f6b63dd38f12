//! Headers-only import templates.

use std::io::Write;

use crate::error::CoreError;
use crate::schema_index::SchemaIndex;

/// Which attributes a template lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateScope {
    Required { include_conditional: bool },
    All,
}

/// Column headers for importing `schema_names`.
///
/// Relationship attributes are listed by their display attribute. A header
/// that would also resolve to a schema outside the selection is qualified
/// as `[schema]attr` so the import stays within the selected schemas.
pub fn template_headers(
    index: &SchemaIndex<'_>,
    schema_names: &[&str],
    scope: TemplateScope,
) -> Result<Vec<String>, CoreError> {
    let mut headers: Vec<String> = Vec::new();

    for &schema_name in schema_names {
        index.user_schema(schema_name)?;
        let attributes = match scope {
            TemplateScope::Required {
                include_conditional,
            } => index.required_attributes(schema_name, include_conditional),
            TemplateScope::All => index.visible_attributes(schema_name),
        };

        for attribute in attributes.into_iter().filter(|a| !a.system) {
            let base = attribute.display_header().unwrap_or(&attribute.name);
            let shared_outside = index
                .schemas_defining(base)
                .iter()
                .any(|s| !schema_names.contains(s));
            let header = if shared_outside {
                format!("[{schema_name}]{base}")
            } else {
                base.to_string()
            };
            if !headers.contains(&header) {
                headers.push(header);
            }
        }
    }

    Ok(headers)
}

/// Write `headers` as a single CSV record.
pub fn write_csv_template<W: Write>(writer: W, headers: &[String]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(headers)?;
    csv_writer.flush()?;
    Ok(())
}
