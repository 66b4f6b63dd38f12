//! Read-only lookups over the loaded schema set.

use crate::error::CoreError;
use crate::schema::{Attribute, Schema, SchemaMap};

/// One candidate resolution of an import header.
///
/// `attribute` and `schema_name` are `None` for the single "not found"
/// record returned when nothing matches.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMatch<'a> {
    pub attribute: Option<&'a Attribute>,
    pub schema_name: Option<&'a str>,
    pub lookup_attribute_name: String,
    pub lookup_schema_name: Option<String>,
}

impl AttributeMatch<'_> {
    pub fn is_found(&self) -> bool {
        self.attribute.is_some()
    }
}

/// In-memory view over the schema set.
#[derive(Debug, Clone, Copy)]
pub struct SchemaIndex<'a> {
    schemas: &'a SchemaMap,
}

impl<'a> SchemaIndex<'a> {
    pub fn new(schemas: &'a SchemaMap) -> Self {
        Self { schemas }
    }

    pub fn schema(&self, name: &str) -> Option<&'a Schema> {
        self.schemas.get(name)
    }

    /// A user schema by name, or the reason it cannot be used for import.
    pub fn user_schema(&self, name: &str) -> Result<&'a Schema, CoreError> {
        let schema = self
            .schema(name)
            .ok_or_else(|| CoreError::SchemaNotFound(name.to_string()))?;
        if schema.is_user() {
            Ok(schema)
        } else {
            Err(CoreError::NotUserSchema(name.to_string()))
        }
    }

    /// User schemas in provider order.
    pub fn user_schemas(&self) -> impl Iterator<Item = &'a Schema> {
        let schemas = self.schemas;
        schemas.values().filter(|s| s.is_user())
    }

    /// Resolve an unqualified header `key`, optionally restricted to the
    /// schema named by `schema_hint`.
    ///
    /// At most one match is returned per schema, preferring an attribute
    /// whose name equals `key` over a relationship whose display attribute
    /// does. An unknown or non-user hinted schema yields "not found" rather
    /// than a fallback to unqualified search.
    pub fn lookup(&self, key: &str, schema_hint: Option<&str>) -> Vec<AttributeMatch<'a>> {
        let candidates: Vec<&'a Schema> = match schema_hint {
            Some(hint) => self
                .schema(hint)
                .filter(|s| s.is_user())
                .into_iter()
                .collect(),
            None => self.user_schemas().collect(),
        };

        let matches: Vec<AttributeMatch<'a>> = candidates
            .into_iter()
            .filter_map(|schema| {
                let attribute = schema
                    .attributes
                    .iter()
                    .find(|a| a.name == key)
                    .or_else(|| schema.attributes.iter().find(|a| a.matches_header(key)))?;
                Some(AttributeMatch {
                    attribute: Some(attribute),
                    schema_name: Some(schema.schema_name.as_str()),
                    lookup_attribute_name: key.to_string(),
                    lookup_schema_name: schema_hint.map(str::to_string),
                })
            })
            .collect();

        if matches.is_empty() {
            vec![AttributeMatch {
                attribute: None,
                schema_name: None,
                lookup_attribute_name: key.to_string(),
                lookup_schema_name: schema_hint.map(str::to_string),
            }]
        } else {
            matches
        }
    }

    /// Names of user schemas that define `key` as an attribute or a
    /// relationship display attribute.
    pub fn schemas_defining(&self, key: &str) -> Vec<&'a str> {
        self.lookup(key, None)
            .into_iter()
            .filter_map(|m| m.schema_name)
            .collect()
    }

    /// Attributes of `schema_name` that must always be supplied, optionally
    /// including those that only become required through their conditions.
    pub fn required_attributes(
        &self,
        schema_name: &str,
        include_conditional: bool,
    ) -> Vec<&'a Attribute> {
        let Some(schema) = self.schema(schema_name) else {
            return Vec::new();
        };
        schema
            .attributes
            .iter()
            .filter(|a| !a.system)
            .filter(|a| a.required || (include_conditional && a.is_conditionally_required()))
            .collect()
    }

    /// All non-hidden attributes of `schema_name`.
    pub fn visible_attributes(&self, schema_name: &str) -> Vec<&'a Attribute> {
        self.schema(schema_name)
            .map(|s| s.attributes.iter().filter(|a| !a.hidden).collect())
            .unwrap_or_default()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::migration_schemas;
    use super::*;

    #[test]
    fn unqualified_lookup_finds_name_and_display_matches() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);

        let matches = index.lookup("wave_name", None);
        let names: Vec<_> = matches.iter().filter_map(|m| m.schema_name).collect();
        assert_eq!(names, vec!["wave", "application"]);
        assert_eq!(matches[1].attribute.unwrap().name, "wave_id");
    }

    #[test]
    fn qualified_lookup_restricts_to_schema() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);

        let matches = index.lookup("wave_name", Some("application"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].schema_name, Some("application"));
        assert_eq!(matches[0].lookup_schema_name.as_deref(), Some("application"));
    }

    #[test]
    fn qualified_lookup_with_unknown_or_non_user_schema_is_not_found() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);

        for hint in ["nope", "script"] {
            let matches = index.lookup("script_name", Some(hint));
            assert_eq!(matches.len(), 1);
            assert!(!matches[0].is_found());
        }
    }

    #[test]
    fn lookup_is_case_sensitive_on_attribute_name() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        assert!(!index.lookup("Server_Name", None)[0].is_found());
        assert!(index.lookup("instanceType", None)[0].is_found());
    }

    #[test]
    fn automation_schemas_are_not_importable() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        assert!(!index.lookup("script_name", None)[0].is_found());
        assert!(index.user_schema("script").is_err());
        assert!(index.user_schema("wave").is_ok());
    }

    #[test]
    fn required_attributes_optionally_include_conditional() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);

        let plain: Vec<_> = index
            .required_attributes("server", false)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(plain, vec!["server_name", "app_id"]);

        let with_conditional: Vec<_> = index
            .required_attributes("server", true)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(with_conditional, vec!["server_name", "app_id", "instanceType"]);
    }

    #[test]
    fn visible_attributes_skip_hidden() {
        let schemas = migration_schemas();
        let index = SchemaIndex::new(&schemas);
        assert!(index
            .visible_attributes("server")
            .iter()
            .all(|a| a.name != "notes"));
    }
}
