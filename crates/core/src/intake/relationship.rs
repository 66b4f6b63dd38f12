//! Resolution of relationship cells against live target collections.

use crate::live::LiveSnapshot;
use crate::schema::{Attribute, RelationshipTarget};
use crate::types::{text_at, Record};

use super::coerce::split_multi;
use super::mapping::AttributeMapping;
use super::value::{RelationRef, RelationshipValue};

/// Whether an import column holds target display names or raw target ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStyle {
    DisplayName,
    Id,
}

/// Classify the header a relationship mapping came from.
///
/// A header naming the display attribute carries names. A header naming
/// the attribute itself carries ids, unless the attribute is multi-select,
/// in which case it also carries names.
pub fn reference_style(mapping: &AttributeMapping) -> ReferenceStyle {
    let attribute = &mapping.attribute;
    if attribute.display_header() == Some(mapping.lookup_attribute_name.as_str()) {
        ReferenceStyle::DisplayName
    } else if attribute.list_multi_select {
        ReferenceStyle::DisplayName
    } else {
        ReferenceStyle::Id
    }
}

/// Build the relationship value for `raw`.
///
/// `source` is the importing record's raw values, used for the optional
/// filter attribute pair. Returns `None` for a relationship attribute with
/// no target entity or key.
pub fn materialize(
    mapping: &AttributeMapping,
    raw: &str,
    source: &Record,
    live: &LiveSnapshot,
) -> Option<RelationshipValue> {
    let attribute = &mapping.attribute;
    let target = attribute.relationship_target()?;
    let multi = attribute.list_multi_select;

    let tokens = if multi {
        split_multi(raw)
    } else {
        let token = raw.trim();
        if token.is_empty() {
            Vec::new()
        } else {
            vec![token.to_string()]
        }
    };

    let refs = match reference_style(mapping) {
        ReferenceStyle::Id => tokens.into_iter().map(RelationRef::Resolved).collect(),
        ReferenceStyle::DisplayName => {
            let candidates = candidates(attribute, &target, source, live);
            tokens
                .into_iter()
                .map(|token| resolve_name(&target, &candidates, token))
                .collect()
        }
    };

    Some(RelationshipValue {
        target,
        multi,
        refs,
    })
}

/// Live target records, narrowed by the filter attribute pair when the
/// importing record supplies the source value.
fn candidates<'a>(
    attribute: &Attribute,
    target: &RelationshipTarget,
    source: &Record,
    live: &'a LiveSnapshot,
) -> Vec<&'a Record> {
    let records = live.records(&target.rel_entity);
    let filter = match (
        attribute.rel_filter_attribute_name.as_deref(),
        attribute.source_filter_attribute_name.as_deref(),
    ) {
        (Some(rel_filter), Some(source_filter)) => {
            text_at(source, source_filter).map(|value| (rel_filter, value))
        }
        _ => None,
    };

    match filter {
        Some((rel_filter, value)) => records
            .iter()
            .filter(|r| text_at(r, rel_filter).as_deref() == Some(value.as_str()))
            .collect(),
        None => records.iter().collect(),
    }
}

fn resolve_name(target: &RelationshipTarget, candidates: &[&Record], name: String) -> RelationRef {
    let wanted = name.to_lowercase();
    candidates
        .iter()
        .find(|r| {
            text_at(r, &target.rel_display_attribute).is_some_and(|d| d.to_lowercase() == wanted)
        })
        .and_then(|r| text_at(r, &target.rel_key))
        .map(RelationRef::Resolved)
        .unwrap_or(RelationRef::Pending(name))
}
