//! Boolean condition trees evaluated against a record.
//!
//! A [`Condition`] names a field path, an [`Operator`] and a comparison
//! value, optionally combined with nested sub-conditions. Evaluation is pure:
//! the same condition and record always produce the same answer, and
//! problems such as unknown operators are recovered locally (logged and
//! treated as `false`) rather than surfaced to the caller.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::record;

/// A condition on a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Field path, e.g. `serbatoi[0].volume` or `compressori.length`
    pub field: String,

    /// Comparison operator
    pub operator: Operator,

    /// Comparison value; ignored by the emptiness operators
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,

    /// How sub-conditions combine with this condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,

    /// Nested conditions of the same shape
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_conditions: Vec<Condition>,
}

/// Keep an explicit `null` distinct from a missing key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Condition {
    /// Create a condition with a comparison value.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
            logical_operator: None,
            sub_conditions: Vec::new(),
        }
    }

    /// Create a condition for an operator that takes no value.
    pub fn unary(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            logical_operator: None,
            sub_conditions: Vec::new(),
        }
    }

    /// Require this condition and every given sub-condition.
    pub fn and(mut self, subs: impl IntoIterator<Item = Condition>) -> Self {
        self.logical_operator = Some(LogicalOperator::And);
        self.sub_conditions.extend(subs);
        self
    }

    /// Require this condition or any given sub-condition.
    pub fn or(mut self, subs: impl IntoIterator<Item = Condition>) -> Self {
        self.logical_operator = Some(LogicalOperator::Or);
        self.sub_conditions.extend(subs);
        self
    }

    /// Evaluate this condition against a record.
    pub fn evaluate(&self, record: &Value) -> bool {
        evaluate(self, record)
    }

    /// Human-readable rendering of the condition tree.
    pub fn describe(&self) -> String {
        describe(self, 0)
    }

    /// Every operator in the tree that failed to parse.
    pub fn unknown_operators(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_unknown(&mut found);
        found
    }

    fn collect_unknown<'a>(&'a self, found: &mut Vec<&'a str>) {
        if let Operator::Unknown(name) = &self.operator {
            found.push(name);
        }
        for sub in &self.sub_conditions {
            sub.collect_unknown(found);
        }
    }
}

/// Comparison operators.
///
/// Unrecognized operator names deserialize into [`Operator::Unknown`] so a
/// template carrying one still loads; such conditions evaluate to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    /// Strict equality
    Eq,
    /// Strict inequality
    Ne,
    /// Numeric greater-than
    Gt,
    /// Numeric greater-or-equal
    Gte,
    /// Numeric less-than
    Lt,
    /// Numeric less-or-equal
    Lte,
    /// List membership or substring
    Contains,
    /// Null, absent, empty string or empty list
    IsEmpty,
    /// Negation of `IsEmpty`
    IsNotEmpty,
    /// Operator name not understood
    Unknown(String),
}

impl Operator {
    /// Wire name of the operator.
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::Unknown(name) => name,
        }
    }

    /// Whether the operator ignores the comparison value.
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    fn label(&self) -> &str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "≠",
            Operator::Gt => ">",
            Operator::Gte => "≥",
            Operator::Lt => "<",
            Operator::Lte => "≤",
            Operator::Contains => "contains",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
            Operator::Unknown(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "contains" => Operator::Contains,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            _ => Operator::Unknown(name),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a condition combines with its sub-conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// main && every(sub)
    #[serde(rename = "AND")]
    And,
    /// main || any(sub)
    #[serde(rename = "OR")]
    Or,
}

impl LogicalOperator {
    fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Evaluate a condition tree against a record.
///
/// Each sub-condition applies its own logical operator to its own subtree;
/// nothing is flattened across levels.
pub fn evaluate(condition: &Condition, record: &Value) -> bool {
    let field = field_value(record, &condition.field);
    let main = apply(
        field.as_deref(),
        &condition.operator,
        condition.value.as_ref(),
    );

    if condition.sub_conditions.is_empty() {
        return main;
    }

    match condition.logical_operator {
        Some(LogicalOperator::And) => {
            main && condition.sub_conditions.iter().all(|c| evaluate(c, record))
        }
        Some(LogicalOperator::Or) => {
            main || condition.sub_conditions.iter().any(|c| evaluate(c, record))
        }
        None => main,
    }
}

/// Resolved field for condition purposes: a null field counts as absent.
fn field_value<'a>(record: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() {
        return None;
    }
    record::resolve(record, path).filter(|v| !v.is_null())
}

fn apply(field: Option<&Value>, operator: &Operator, compare: Option<&Value>) -> bool {
    match operator {
        Operator::Eq => record::strict_equals(field, compare),
        Operator::Ne => !record::strict_equals(field, compare),
        Operator::Gt => record::to_number(field) > record::to_number(compare),
        Operator::Gte => record::to_number(field) >= record::to_number(compare),
        Operator::Lt => record::to_number(field) < record::to_number(compare),
        Operator::Lte => record::to_number(field) <= record::to_number(compare),
        Operator::Contains => match field {
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| record::strict_equals(Some(item), compare)),
            Some(Value::String(s)) => s.contains(&record::to_display_string(compare)),
            _ => false,
        },
        Operator::IsEmpty => record::is_empty(field),
        Operator::IsNotEmpty => !record::is_empty(field),
        Operator::Unknown(name) => {
            log::warn!("Unknown condition operator '{}', treating as false", name);
            false
        }
    }
}

fn describe(condition: &Condition, depth: usize) -> String {
    let label = condition.operator.label();
    let main = if condition.operator.is_unary() {
        format!("{} {}", condition.field, label)
    } else {
        let value = condition
            .value
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "undefined".to_string());
        format!("{} {} {}", condition.field, label, value)
    };

    if condition.sub_conditions.is_empty() {
        return main;
    }

    let op = condition
        .logical_operator
        .unwrap_or(LogicalOperator::And)
        .as_str();
    let subs: Vec<String> = condition
        .sub_conditions
        .iter()
        .map(|sub| describe(sub, depth + 1))
        .collect();

    if depth == 0 {
        let joiner = format!("\n{}\n", op);
        format!("{}{}{}", main, joiner, subs.join(&joiner))
    } else {
        format!("({} {} {})", main, op, subs.join(&format!(" {} ", op)))
    }
}

/// Outcome of evaluating a condition, for previews and debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionProbe {
    /// Evaluation result
    pub result: bool,
    /// Value the field path resolved to, `None` when absent
    pub field_value: Option<Value>,
    /// Human-readable condition
    pub description: String,
}

/// Evaluate a condition and report what it saw.
pub fn probe(condition: &Condition, record: &Value) -> ConditionProbe {
    ConditionProbe {
        result: evaluate(condition, record),
        field_value: field_value(record, &condition.field).map(Cow::into_owned),
        description: condition.describe(),
    }
}
