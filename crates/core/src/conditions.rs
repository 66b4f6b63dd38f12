//! Conditional attribute behaviour.
//!
//! An attribute may carry a `conditions` block: a list of queries over
//! sibling attribute values and the effects to apply when all of them hold
//! (`true`) or not (`false`).
//!
//! ```json
//! {
//!   "queries": [{"attribute": "r_type", "comparator": "=", "value": "Rehost"}],
//!   "outcomes": {"true": ["required"], "false": ["not_required"]}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{get_path, is_blank, value_as_text, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "!empty")]
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionEffect {
    Required,
    NotRequired,
    Hidden,
    NotHidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionQuery {
    pub attribute: String,
    pub comparator: Comparator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcomes {
    #[serde(rename = "true", default)]
    pub when_true: Vec<ConditionEffect>,
    #[serde(rename = "false", default)]
    pub when_false: Vec<ConditionEffect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeConditions {
    #[serde(default)]
    pub queries: Vec<ConditionQuery>,
    #[serde(default)]
    pub outcomes: ConditionOutcomes,
}

/// Effects resolved for one record. `None` means the conditions say nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionState {
    pub required: Option<bool>,
    pub hidden: Option<bool>,
}

impl AttributeConditions {
    /// Evaluate all queries against `record` and collect the resulting effects.
    pub fn evaluate(&self, record: &Record) -> ConditionState {
        let holds = self.queries.iter().all(|q| q.matches(record));
        let effects = if holds {
            &self.outcomes.when_true
        } else {
            &self.outcomes.when_false
        };

        let mut state = ConditionState::default();
        for effect in effects {
            match effect {
                ConditionEffect::Required => state.required = Some(true),
                ConditionEffect::NotRequired => state.required = Some(false),
                ConditionEffect::Hidden => state.hidden = Some(true),
                ConditionEffect::NotHidden => state.hidden = Some(false),
            }
        }
        state
    }

    /// Whether either outcome can make the attribute required.
    pub fn may_require(&self) -> bool {
        self.outcomes
            .when_true
            .iter()
            .chain(&self.outcomes.when_false)
            .any(|e| *e == ConditionEffect::Required)
    }
}

impl ConditionQuery {
    fn matches(&self, record: &Record) -> bool {
        let current = get_path(record, &self.attribute);
        match self.comparator {
            Comparator::Empty => is_blank(current),
            Comparator::NotEmpty => !is_blank(current),
            Comparator::Equals => self.equals(current),
            Comparator::NotEquals => !self.equals(current),
        }
    }

    fn equals(&self, current: Option<&Value>) -> bool {
        let expected = match &self.value {
            None | Some(Value::Null) => return is_blank(current),
            Some(v) => v,
        };
        let expected_text = value_as_text(expected);
        match current {
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item == expected || value_as_text(item) == expected_text),
            Some(v) => v == expected || (expected_text.is_some() && value_as_text(v) == expected_text),
            None => false,
        }
    }
}
