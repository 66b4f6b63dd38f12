//! Conversion of raw cell text into typed attribute values.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::{Attribute, AttributeType};

use super::value::{FieldValue, Tag};

/// Separator for multi-valued cells.
pub const MULTI_VALUE_SEPARATOR: char = ';';

static CHECKBOX_TRUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(true|1|on)\s*$").expect("valid checkbox regex"));

/// Outcome of coercing one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coercion {
    Value(FieldValue),
    /// Relationship values need live data and are built by the
    /// relationship materializer.
    Relationship,
    /// The attribute's type is not one the importer understands.
    Unsupported(String),
}

/// Split a multi-valued cell on `;`, trimming segments and dropping empty ones.
pub fn split_multi(raw: &str) -> Vec<String> {
    raw.split(MULTI_VALUE_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `key=value;key2=value2`. A segment without `=` becomes a tag with
/// an empty value.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    split_multi(raw)
        .into_iter()
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => Tag {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => Tag {
                key: segment,
                value: String::new(),
            },
        })
        .collect()
}

pub fn parse_checkbox(raw: &str) -> bool {
    CHECKBOX_TRUE.is_match(raw)
}

pub fn coerce(attribute: &Attribute, raw: &str) -> Coercion {
    let value = match &attribute.attr_type {
        AttributeType::List if attribute.list_multi_select => FieldValue::List(split_multi(raw)),
        AttributeType::MultivalueString => FieldValue::List(split_multi(raw)),
        AttributeType::Tag => FieldValue::Tags(parse_tags(raw)),
        AttributeType::Checkbox => FieldValue::Bool(parse_checkbox(raw)),
        AttributeType::Relationship => return Coercion::Relationship,
        AttributeType::Unknown(name) => return Coercion::Unsupported(name.clone()),
        AttributeType::List
        | AttributeType::String
        | AttributeType::TextArea
        | AttributeType::Json
        | AttributeType::Date
        | AttributeType::Password
        | AttributeType::Groups
        | AttributeType::Policy
        | AttributeType::Policies
        | AttributeType::EmbeddedEntity => FieldValue::Text(raw.to_string()),
    };
    Coercion::Value(value)
}
