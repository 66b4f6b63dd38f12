//! Per-cell validation of raw values against their attribute definition.

use regex::Regex;

use crate::schema::{Attribute, AttributeType};

use super::coerce::split_multi;

pub const REQUIRED_MESSAGE: &str = "must specify a value";
const DEFAULT_REGEX_MESSAGE: &str = "value does not match the required format";

/// Validate one raw cell value. Returns the error messages, empty when the
/// value is acceptable.
///
/// Surrounding whitespace is ignored, as it is when the value is coerced.
pub fn validate_value(attribute: &Attribute, raw: &str, required: bool) -> Vec<String> {
    let mut errors = Vec::new();
    let raw = raw.trim();

    if let AttributeType::Unknown(name) = &attribute.attr_type {
        errors.push(format!("unsupported attribute type '{name}'"));
        return errors;
    }

    let segments = segments(attribute, raw);
    if segments.is_empty() {
        if required {
            errors.push(REQUIRED_MESSAGE.to_string());
        }
        return errors;
    }

    if attribute.attr_type == AttributeType::List {
        if let Some(allowed) = attribute.allowed_values() {
            for value in &segments {
                let ok = allowed.iter().any(|a| a.to_lowercase() == value.to_lowercase());
                if !ok {
                    errors.push(format!(
                        "'{value}' is not a valid value, allowed values are: {}",
                        allowed.join(", ")
                    ));
                }
            }
        }
    }

    if let Some(pattern) = attribute.validation_regex.as_deref().filter(|p| !p.is_empty()) {
        // An unparsable pattern never fails a value.
        if let Ok(re) = Regex::new(&format!("^(?:{pattern})$")) {
            if segments.iter().any(|v| !re.is_match(v)) {
                errors.push(
                    attribute
                        .validation_regex_msg
                        .clone()
                        .unwrap_or_else(|| DEFAULT_REGEX_MESSAGE.to_string()),
                );
            }
        }
    }

    if attribute.attr_type == AttributeType::Json {
        if let Err(e) = serde_json::from_str::<serde_json::Value>(raw) {
            errors.push(format!("invalid JSON: {e}"));
        }
    }

    errors
}

/// The values a cell holds: split for multi-valued types, whole otherwise.
fn segments(attribute: &Attribute, raw: &str) -> Vec<String> {
    let multi = match attribute.attr_type {
        AttributeType::MultivalueString | AttributeType::Tag => true,
        AttributeType::List | AttributeType::Relationship => attribute.list_multi_select,
        _ => false,
    };
    if multi {
        split_multi(raw)
    } else if raw.trim().is_empty() {
        Vec::new()
    } else {
        vec![raw.trim().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_index::fixtures::migration_schemas;

    fn attribute(schema: &str, name: &str) -> Attribute {
        migration_schemas()[schema].attribute(name).unwrap().clone()
    }

    #[test]
    fn required_empty_value() {
        let attr = attribute("wave", "wave_name");
        assert_eq!(validate_value(&attr, "  ", true), vec![REQUIRED_MESSAGE]);
        assert!(validate_value(&attr, "  ", false).is_empty());
    }

    #[test]
    fn required_multi_value_with_only_separators_is_empty() {
        let attr = attribute("server", "security_group_IDs");
        assert_eq!(validate_value(&attr, ";;", true), vec![REQUIRED_MESSAGE]);
    }

    #[test]
    fn list_membership_is_case_insensitive() {
        let attr = attribute("server", "server_os_family");
        assert!(validate_value(&attr, "Linux", false).is_empty());
        let errors = validate_value(&attr, "solaris", false);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("windows, linux"));
    }

    #[test]
    fn multi_select_list_checks_each_value() {
        let attr = Attribute {
            list_multi_select: true,
            ..attribute("server", "server_os_family")
        };
        assert!(validate_value(&attr, "linux;windows", false).is_empty());
        assert_eq!(validate_value(&attr, "linux;beos;plan9", false).len(), 2);
    }

    #[test]
    fn regex_matches_whole_value_case_sensitively() {
        let attr = attribute("application", "aws_accountid");
        assert!(validate_value(&attr, "123456789012", false).is_empty());
        assert_eq!(
            validate_value(&attr, "1234567890123", false),
            vec!["AWS account id must be 12 digits"]
        );

        let lower = Attribute {
            validation_regex: Some("[a-z]+".to_string()),
            validation_regex_msg: None,
            ..attribute("application", "aws_accountid")
        };
        assert_eq!(validate_value(&lower, "ABC", false), vec![DEFAULT_REGEX_MESSAGE]);
    }

    #[test]
    fn padding_is_ignored_for_list_and_regex_checks() {
        let list = attribute("server", "server_os_family");
        assert!(validate_value(&list, " linux ", false).is_empty());

        let regex = attribute("application", "aws_accountid");
        assert!(validate_value(&regex, " 123456789012\t", false).is_empty());
    }

    #[test]
    fn invalid_regex_never_fails() {
        let attr = Attribute {
            validation_regex: Some("([".to_string()),
            ..Default::default()
        };
        assert!(validate_value(&attr, "anything", false).is_empty());
    }

    #[test]
    fn json_syntax_errors_cite_parser() {
        let attr = Attribute {
            attr_type: AttributeType::Json,
            ..Default::default()
        };
        assert!(validate_value(&attr, r#"{"a": 1}"#, false).is_empty());
        let errors = validate_value(&attr, "{a", false);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("invalid JSON: "));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let attr = Attribute {
            attr_type: AttributeType::Unknown("geo".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_value(&attr, "x", false), vec!["unsupported attribute type 'geo'"]);
    }
}
