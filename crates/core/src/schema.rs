//! Typed entity schema model.
//!
//! Schemas are loaded once per session by the surrounding application and
//! handed to the intake engine by reference. Field names follow the JSON
//! schema documents served by the Migration Factory admin API.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conditions::AttributeConditions;
use crate::error::CoreError;
use crate::types::Record;

/// Schemas keyed by `schema_name`, in provider order.
pub type SchemaMap = IndexMap<String, Schema>;

// ---------------------------------------------------------------------------
// Schema type
// ---------------------------------------------------------------------------

/// Which family a schema belongs to. Only `user` schemas are importable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    User,
    Automation,
    System,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Automation => "automation",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attribute type
// ---------------------------------------------------------------------------

/// The closed set of attribute types the intake engine understands.
///
/// Unrecognised type names are kept in [`AttributeType::Unknown`] so that
/// coercion can reject them explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeType {
    #[default]
    String,
    TextArea,
    List,
    MultivalueString,
    Tag,
    Relationship,
    Json,
    Checkbox,
    Date,
    Password,
    Groups,
    Policy,
    Policies,
    EmbeddedEntity,
    Unknown(String),
}

impl AttributeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::TextArea => "textarea",
            Self::List => "list",
            Self::MultivalueString => "multivalue-string",
            Self::Tag => "tag",
            Self::Relationship => "relationship",
            Self::Json => "json",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Password => "password",
            Self::Groups => "groups",
            Self::Policy => "policy",
            Self::Policies => "policies",
            Self::EmbeddedEntity => "embedded_entity",
            Self::Unknown(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "" | "string" => Self::String,
            "textarea" => Self::TextArea,
            "list" => Self::List,
            "multivalue-string" => Self::MultivalueString,
            "tag" => Self::Tag,
            "relationship" => Self::Relationship,
            "json" => Self::Json,
            "checkbox" => Self::Checkbox,
            "date" => Self::Date,
            "password" => Self::Password,
            "groups" => Self::Groups,
            "policy" => Self::Policy,
            "policies" => Self::Policies,
            "embedded_entity" => Self::EmbeddedEntity,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for AttributeType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<AttributeType> for String {
    fn from(attr_type: AttributeType) -> Self {
        attr_type.as_str().to_string()
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// One attribute definition within a [`Schema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Dotted path of the attribute within a record.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub attr_type: AttributeType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    /// System-managed attributes (ids, history) are never user supplied.
    #[serde(default)]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<AttributeConditions>,
    #[serde(rename = "listMultiSelect", default)]
    pub list_multi_select: bool,
    /// Static comma-separated allowed values for `list` attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listvalue: Option<String>,
    #[serde(rename = "listValueAPI", default, skip_serializing_if = "Option::is_none")]
    pub list_value_api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_regex_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_display_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_filter_attribute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter_attribute_name: Option<String>,
}

/// Where a relationship attribute points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTarget {
    pub rel_entity: String,
    pub rel_key: String,
    pub rel_display_attribute: String,
}

impl Attribute {
    pub fn is_relationship(&self) -> bool {
        self.attr_type == AttributeType::Relationship
    }

    /// Label used in user-facing messages.
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    /// `true` if `key` names this attribute or, for relationships, its
    /// display attribute on the target entity.
    pub fn matches_header(&self, key: &str) -> bool {
        self.name == key || self.display_header() == Some(key)
    }

    /// The display attribute header of a relationship, if any.
    pub fn display_header(&self) -> Option<&str> {
        if self.is_relationship() {
            self.rel_display_attribute.as_deref()
        } else {
            None
        }
    }

    /// Target of a relationship attribute. The display attribute falls back
    /// to the key attribute when the schema omits it.
    pub fn relationship_target(&self) -> Option<RelationshipTarget> {
        if !self.is_relationship() {
            return None;
        }
        let rel_entity = self.rel_entity.clone()?;
        let rel_key = self.rel_key.clone()?;
        let rel_display_attribute = self
            .rel_display_attribute
            .clone()
            .unwrap_or_else(|| rel_key.clone());
        Some(RelationshipTarget {
            rel_entity,
            rel_key,
            rel_display_attribute,
        })
    }

    /// Static allowed values parsed from `listvalue`.
    pub fn allowed_values(&self) -> Option<Vec<String>> {
        let raw = self.listvalue.as_deref()?;
        let values: Vec<String> = raw
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Whether the attribute must carry a value in `record`: either always
    /// required, or required by its conditions evaluated against `record`.
    pub fn is_required_for(&self, record: &Record) -> bool {
        if self.required {
            return true;
        }
        self.conditions
            .as_ref()
            .is_some_and(|c| c.evaluate(record).required == Some(true))
    }

    /// Whether the attribute can become required through its conditions.
    pub fn is_conditionally_required(&self) -> bool {
        self.conditions.as_ref().is_some_and(|c| c.may_require())
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// An action offered by automation schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaAction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Description of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub schema_name: String,
    #[serde(default)]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub actions: Vec<SchemaAction>,
}

impl Schema {
    pub fn is_user(&self) -> bool {
        self.schema_type == SchemaType::User
    }

    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.schema_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The attribute identifying records to users, e.g. `wave_name`.
    ///
    /// Prefers `<schema>_name`, then the first non-relationship `*_name`
    /// attribute, then `<schema>_id`, then the first non-relationship `*_id`.
    pub fn business_key_attribute(&self) -> Option<&Attribute> {
        self.attribute(&format!("{}_name", self.schema_name))
            .or_else(|| self.first_plain_with_suffix("_name"))
            .or_else(|| self.id_attribute())
    }

    /// The attribute holding the backend id, e.g. `app_id`.
    pub fn id_attribute(&self) -> Option<&Attribute> {
        self.attribute(&format!("{}_id", self.schema_name))
            .filter(|a| !a.is_relationship())
            .or_else(|| self.first_plain_with_suffix("_id"))
    }

    fn first_plain_with_suffix(&self, suffix: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| !a.is_relationship() && a.name.ends_with(suffix))
    }
}

/// Parse a schema document: either an array of schemas or an object keyed
/// by schema name. Document order is kept in both forms.
pub fn schemas_from_json(raw: &str) -> Result<SchemaMap, CoreError> {
    let invalid = |e: serde_json::Error| CoreError::InvalidSchema(e.to_string());
    let schemas: Vec<Schema> = match raw.trim_start().chars().next() {
        Some('[') => serde_json::from_str(raw).map_err(invalid)?,
        Some('{') => serde_json::from_str::<IndexMap<String, Value>>(raw)
            .map_err(invalid)?
            .into_iter()
            .map(|(name, mut body)| {
                if let Value::Object(obj) = &mut body {
                    obj.entry("schema_name")
                        .or_insert_with(|| Value::String(name.clone()));
                }
                serde_json::from_value::<Schema>(body)
                    .map_err(|e| CoreError::InvalidSchema(format!("{name}: {e}")))
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(CoreError::InvalidSchema(
                "expected an array or object of schemas".to_string(),
            ))
        }
    };
    Ok(schemas
        .into_iter()
        .map(|s| (s.schema_name.clone(), s))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn application() -> Schema {
        serde_json::from_value(json!({
            "schema_name": "application",
            "schema_type": "user",
            "attributes": [
                {"name": "app_id", "type": "string", "system": true},
                {"name": "app_name", "type": "string", "required": true},
                {"name": "wave_id", "type": "relationship", "rel_entity": "wave",
                 "rel_key": "wave_id", "rel_display_attribute": "wave_name"},
                {"name": "aws_region", "type": "list", "listvalue": "us-east-1, eu-west-1"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn attribute_type_parses_known_and_unknown_names() {
        assert_eq!(AttributeType::parse("multivalue-string"), AttributeType::MultivalueString);
        assert_eq!(AttributeType::parse("embedded_entity"), AttributeType::EmbeddedEntity);
        assert_eq!(
            AttributeType::parse("geo"),
            AttributeType::Unknown("geo".to_string())
        );
    }

    #[test]
    fn missing_type_defaults_to_string() {
        let attr: Attribute = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(attr.attr_type, AttributeType::String);
    }

    #[test]
    fn attribute_type_serializes_as_its_name() {
        let attr: Attribute =
            serde_json::from_value(json!({"name": "x", "type": "listy"})).unwrap();
        let back = serde_json::to_value(&attr).unwrap();
        assert_eq!(back["type"], "listy");
    }

    #[test]
    fn business_key_falls_back_to_name_suffix() {
        let schema = application();
        assert_eq!(schema.business_key_attribute().unwrap().name, "app_name");
        assert_eq!(schema.id_attribute().unwrap().name, "app_id");
    }

    #[test]
    fn business_key_prefers_schema_prefix() {
        let schema: Schema = serde_json::from_value(json!({
            "schema_name": "wave",
            "attributes": [
                {"name": "owner_name"},
                {"name": "wave_name"},
                {"name": "wave_id"}
            ]
        }))
        .unwrap();
        assert_eq!(schema.business_key_attribute().unwrap().name, "wave_name");
        assert_eq!(schema.id_attribute().unwrap().name, "wave_id");
    }

    #[test]
    fn relationship_target_defaults_display_to_key() {
        let attr: Attribute = serde_json::from_value(json!({
            "name": "wave_id", "type": "relationship",
            "rel_entity": "wave", "rel_key": "wave_id"
        }))
        .unwrap();
        let target = attr.relationship_target().unwrap();
        assert_eq!(target.rel_display_attribute, "wave_id");
    }

    #[test]
    fn allowed_values_are_trimmed() {
        let schema = application();
        let attr = schema.attribute("aws_region").unwrap();
        assert_eq!(
            attr.allowed_values().unwrap(),
            vec!["us-east-1".to_string(), "eu-west-1".to_string()]
        );
    }

    #[test]
    fn schemas_parse_from_array_and_object() {
        let from_array = schemas_from_json(r#"[{"schema_name": "wave"}]"#).unwrap();
        assert!(from_array.contains_key("wave"));

        let from_object =
            schemas_from_json(r#"{"server": {"schema_type": "user", "attributes": []}}"#).unwrap();
        assert_eq!(from_object["server"].schema_name, "server");
    }

    #[test]
    fn object_document_keeps_provider_order() {
        let schemas = schemas_from_json(
            r#"{"wave": {}, "application": {}, "server": {}, "database": {}}"#,
        )
        .unwrap();
        let names: Vec<&str> = schemas.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["wave", "application", "server", "database"]);
    }

    #[test]
    fn invalid_schema_document_is_rejected() {
        assert!(schemas_from_json("42").is_err());
        assert!(schemas_from_json("not json").is_err());
    }
}
