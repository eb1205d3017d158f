//! Conditions evaluated by the control-flow node kinds.
//!
//! Conditions are deserialized from already-resolved parameters, so their
//! operands are plain JSON values by the time they are matched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use tracing::debug;

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Equal,
    NotEqual,
    Larger,
    LargerEqual,
    Smaller,
    SmallerEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    Regex,
    IsTrue,
    IsFalse,
}

/// A single comparison between two operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub left_value: JsonValue,
    pub operation: Operation,
    /// Ignored by unary operations.
    #[serde(default)]
    pub right_value: JsonValue,
}

impl Condition {
    #[must_use]
    pub fn new(left_value: JsonValue, operation: Operation, right_value: JsonValue) -> Self {
        Self {
            left_value,
            operation,
            right_value,
        }
    }

    /// Returns true if the condition holds.
    #[must_use]
    pub fn matches(&self) -> bool {
        let left = &self.left_value;
        let right = &self.right_value;
        match self.operation {
            Operation::Equal => equals(left, right),
            Operation::NotEqual => !equals(left, right),
            Operation::Larger => compare(left, right) == Some(Ordering::Greater),
            Operation::LargerEqual => matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operation::Smaller => compare(left, right) == Some(Ordering::Less),
            Operation::SmallerEqual => {
                matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))
            }
            Operation::Contains => contains(left, right),
            Operation::NotContains => !contains(left, right),
            Operation::StartsWith => left
                .as_str()
                .is_some_and(|s| s.starts_with(&text(right))),
            Operation::EndsWith => left.as_str().is_some_and(|s| s.ends_with(&text(right))),
            Operation::IsEmpty => is_empty(left),
            Operation::IsNotEmpty => !is_empty(left),
            Operation::Regex => regex_matches(left, right),
            Operation::IsTrue => left.as_bool() == Some(true),
            Operation::IsFalse => left.as_bool() == Some(false),
        }
    }
}

fn equals(left: &JsonValue, right: &JsonValue) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn compare(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(l), JsonValue::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (JsonValue::String(l), JsonValue::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Renders an operand for string operations. Strings are used verbatim.
fn text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn contains(left: &JsonValue, right: &JsonValue) -> bool {
    match left {
        JsonValue::String(s) => s.contains(&text(right)),
        JsonValue::Array(values) => values.iter().any(|v| equals(v, right)),
        JsonValue::Object(map) => right.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(values) => values.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn regex_matches(left: &JsonValue, right: &JsonValue) -> bool {
    let Some(pattern) = right.as_str() else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(&text(left)),
        Err(e) => {
            debug!(pattern, error = %e, "invalid regex never matches");
            false
        }
    }
}

/// How the results of several conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every condition must hold.
    #[default]
    All,
    /// At least one condition must hold.
    Any,
}

/// Conditions combined with ALL or ANY semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    #[must_use]
    pub fn new(combinator: Combinator, conditions: Vec<Condition>) -> Self {
        Self {
            combinator,
            conditions,
        }
    }

    /// Returns true if the group holds.
    ///
    /// A group without conditions never holds, under either combinator.
    #[must_use]
    pub fn holds(&self) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        match self.combinator {
            Combinator::All => self.conditions.iter().all(Condition::matches),
            Combinator::Any => self.conditions.iter().any(Condition::matches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(left: JsonValue, operation: Operation, right: JsonValue) -> bool {
        Condition::new(left, operation, right).matches()
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(check(json!(10), Operation::Larger, json!(9)));
        assert!(check(json!(2), Operation::Equal, json!(2.0)));
        assert!(check(json!(3), Operation::SmallerEqual, json!(3)));
        assert!(!check(json!("10"), Operation::Larger, json!(9)));
    }

    #[test]
    fn strings_compare_lexically() {
        assert!(check(json!("b"), Operation::Larger, json!("a")));
        assert!(check(json!("10"), Operation::Smaller, json!("9")));
        assert!(check(json!("abc"), Operation::StartsWith, json!("ab")));
        assert!(check(json!("abc"), Operation::EndsWith, json!("bc")));
    }

    #[test]
    fn contains_handles_strings_lists_and_objects() {
        assert!(check(json!("order-42"), Operation::Contains, json!(42)));
        assert!(check(json!([1, 2, 3]), Operation::Contains, json!(2)));
        assert!(check(json!({ "id": 1 }), Operation::Contains, json!("id")));
        assert!(check(json!([1]), Operation::NotContains, json!(5)));
    }

    #[test]
    fn emptiness_and_booleans() {
        assert!(check(json!(null), Operation::IsEmpty, json!(null)));
        assert!(check(json!([]), Operation::IsEmpty, json!(null)));
        assert!(check(json!({ "a": 1 }), Operation::IsNotEmpty, json!(null)));
        assert!(check(json!(true), Operation::IsTrue, json!(null)));
        assert!(!check(json!("true"), Operation::IsTrue, json!(null)));
        assert!(check(json!(false), Operation::IsFalse, json!(null)));
    }

    #[test]
    fn invalid_regex_never_matches() {
        assert!(check(json!("abc123"), Operation::Regex, json!("^[a-z]+\\d+$")));
        assert!(!check(json!("abc"), Operation::Regex, json!("(unclosed")));
    }

    #[test]
    fn deserializes_camel_case() {
        let condition: Condition = serde_json::from_value(json!({
            "leftValue": 5,
            "operation": "largerEqual",
            "rightValue": 5
        }))
        .expect("deserialize");
        assert_eq!(condition.operation, Operation::LargerEqual);
        assert!(condition.matches());
    }

    #[test]
    fn group_combinators() {
        let yes = Condition::new(json!(1), Operation::Equal, json!(1));
        let no = Condition::new(json!(1), Operation::Equal, json!(2));

        assert!(ConditionGroup::new(Combinator::Any, vec![no.clone(), yes.clone()]).holds());
        assert!(!ConditionGroup::new(Combinator::All, vec![no, yes]).holds());
        assert!(!ConditionGroup::new(Combinator::All, vec![]).holds());
        assert!(!ConditionGroup::new(Combinator::Any, vec![]).holds());
    }
}
