//! Condition evaluation
//!
//! A condition is a `(field, operator, value)` predicate. The operator set is
//! fixed:
//!
//! - `equals` / `not_equals`
//! - `greater_than` / `less_than`
//! - `contains` - substring containment on the text form of both operands
//! - `exists` - field is present and not null
//!
//! An operator outside this set is kept as [`Operator::Unknown`] and always
//! evaluates to `false`. Evaluation never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::fields::{resolve, EvaluationScope};

/// A single predicate against the execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted field path, e.g. `applicant.income`
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Exists,
    /// Unrecognized operator name, kept verbatim for reporting
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::Contains => "contains",
            Operator::Exists => "exists",
            Operator::Unknown(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            "contains" => Operator::Contains,
            "exists" => Operator::Exists,
            _ => Operator::Unknown(name),
        }
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        operator.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate a condition against the scope
pub fn evaluate(condition: &Condition, scope: &EvaluationScope<'_>) -> bool {
    let actual = resolve(&condition.field, scope);
    compare(actual.as_ref(), &condition.operator, &condition.value)
}

/// True when every condition holds. An empty list holds.
pub fn evaluate_all<'c>(
    conditions: impl IntoIterator<Item = &'c Condition>,
    scope: &EvaluationScope<'_>,
) -> bool {
    conditions.into_iter().all(|c| evaluate(c, scope))
}

/// Apply an operator to an already resolved value. `None` means absent.
pub fn compare(actual: Option<&Value>, operator: &Operator, expected: &Value) -> bool {
    let actual = match (operator, actual) {
        (Operator::Unknown(_), _) => return false,
        (Operator::Exists, value) => return matches!(value, Some(v) if !v.is_null()),
        // absent never equals anything
        (Operator::NotEquals, None) => return true,
        (_, None) => return false,
        (_, Some(value)) => value,
    };

    match operator {
        Operator::Equals => loose_equals(actual, expected),
        Operator::NotEquals => !loose_equals(actual, expected),
        Operator::GreaterThan => ordering(actual, expected) == Some(Ordering::Greater),
        Operator::LessThan => ordering(actual, expected) == Some(Ordering::Less),
        Operator::Contains => to_text(actual).contains(&to_text(expected)),
        Operator::Exists | Operator::Unknown(_) => false,
    }
}

/// Strict equality, except that numbers compare by numeric value
fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Two strings order lexicographically; otherwise both sides must read as numbers
fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    as_number(a)?.partial_cmp(&as_number(b)?)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Text form used by `contains`
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
