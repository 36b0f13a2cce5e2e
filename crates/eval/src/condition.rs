//! Condition tree evaluation.
//!
//! A leaf that references a missing field is a non-match, not an error —
//! except for the existence operators, which exist precisely to ask that
//! question. Internal faults (type mismatches, invalid regexes) degrade
//! the leaf to `false` and are logged; they never abort evaluation.
//!
//! An empty tree evaluates to `true`: a ruleset with no restrictions
//! matches every listing.

use std::fmt;

use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::context::Context;
use crate::model::{Condition, FieldType, LogicalOp, Operator};
use crate::trace::TraceCollector;
use crate::value::Value;

/// Evaluate a condition tree against a context.
pub fn eval_condition(cond: &Condition, ctx: &Context, collector: &mut TraceCollector) -> bool {
    match cond {
        Condition::Group {
            logical_operator,
            children,
        } => {
            if children.is_empty() {
                return true;
            }
            match logical_operator {
                // Short-circuit: AND stops at the first false child,
                // OR at the first true one, in stored child order.
                LogicalOp::And => children.iter().all(|c| eval_condition(c, ctx, collector)),
                LogicalOp::Or => children.iter().any(|c| eval_condition(c, ctx, collector)),
            }
        }
        Condition::Leaf {
            field_name,
            field_type,
            operator,
            value,
        } => match eval_leaf(field_name, *field_type, *operator, value, ctx, collector) {
            Ok(matched) => matched,
            Err(fault) => {
                tracing::warn!(
                    field = %field_name,
                    operator = ?operator,
                    "condition degraded to non-match: {}",
                    fault
                );
                false
            }
        },
    }
}

// ──────────────────────────────────────────────
// Leaf evaluation
// ──────────────────────────────────────────────

/// Internal leaf faults. Never escape this module.
#[derive(Debug)]
enum ConditionFault {
    TypeMismatch { message: String },
    UnsupportedOperator { operator: Operator, kind: FieldType },
    InvalidRegex { message: String },
    BadValue { message: String },
}

impl fmt::Display for ConditionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionFault::TypeMismatch { message } => {
                write!(f, "type mismatch: {}", message)
            }
            ConditionFault::UnsupportedOperator { operator, kind } => {
                write!(f, "operator {:?} is not defined for {:?} fields", operator, kind)
            }
            ConditionFault::InvalidRegex { message } => {
                write!(f, "invalid regex: {}", message)
            }
            ConditionFault::BadValue { message } => {
                write!(f, "bad condition value: {}", message)
            }
        }
    }
}

fn eval_leaf(
    field_name: &str,
    field_type: FieldType,
    operator: Operator,
    value: &serde_json::Value,
    ctx: &Context,
    collector: &mut TraceCollector,
) -> Result<bool, ConditionFault> {
    collector.record_field(field_name);

    // Existence operators are the only ones where absence matters
    // positively.
    match operator {
        Operator::NotExists => return Ok(!ctx.contains(field_name)),
        Operator::IsEmpty => {
            return Ok(match ctx.get(field_name) {
                None => true,
                Some(Value::Text(s)) => s.is_empty(),
                Some(Value::List(items)) => items.is_empty(),
                Some(_) => false,
            });
        }
        _ => {}
    }

    // Absence is non-match, never an error.
    let Some(actual) = ctx.get(field_name) else {
        return Ok(false);
    };

    match operator {
        Operator::Eq => leaf_eq(actual, value, field_type),
        Operator::Neq => leaf_eq(actual, value, field_type).map(|b| !b),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            leaf_ordering(actual, value, field_type, operator)
        }
        Operator::In => leaf_membership(actual, value, field_type),
        Operator::NotIn => leaf_membership(actual, value, field_type).map(|b| !b),
        Operator::Contains => match actual {
            Value::Text(haystack) => {
                let needle = value.as_str().ok_or_else(|| ConditionFault::BadValue {
                    message: "contains on a text field needs a string value".to_string(),
                })?;
                Ok(haystack.contains(needle))
            }
            Value::List(items) => {
                for item in items {
                    if scalar_eq(item, value, field_type)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(ConditionFault::TypeMismatch {
                message: format!(
                    "contains needs a text or list field, got {}",
                    other.type_name()
                ),
            }),
        },
        Operator::Regex => {
            let pattern = value.as_str().ok_or_else(|| ConditionFault::BadValue {
                message: "regex operator needs a string pattern".to_string(),
            })?;
            let text = actual.as_text().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("regex needs a text field, got {}", actual.type_name()),
            })?;
            let re = Regex::new(pattern).map_err(|e| ConditionFault::InvalidRegex {
                message: e.to_string(),
            })?;
            Ok(re.is_match(text))
        }
        Operator::IsEmpty | Operator::NotExists => unreachable!("handled above"),
    }
}

fn leaf_eq(
    actual: &Value,
    value: &serde_json::Value,
    field_type: FieldType,
) -> Result<bool, ConditionFault> {
    scalar_eq(actual, value, field_type)
}

fn scalar_eq(
    actual: &Value,
    value: &serde_json::Value,
    field_type: FieldType,
) -> Result<bool, ConditionFault> {
    match field_type {
        FieldType::Number => {
            let left = actual.as_number().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("expected a numeric field, got {}", actual.type_name()),
            })?;
            let right = coerce_number(value)?;
            Ok(left == right)
        }
        FieldType::Text => {
            let left = actual.as_text().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("expected a text field, got {}", actual.type_name()),
            })?;
            let right = value.as_str().ok_or_else(|| ConditionFault::BadValue {
                message: "expected a string condition value".to_string(),
            })?;
            Ok(left == right)
        }
        FieldType::Boolean => {
            let left = actual.as_bool().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("expected a boolean field, got {}", actual.type_name()),
            })?;
            let right = value.as_bool().ok_or_else(|| ConditionFault::BadValue {
                message: "expected a boolean condition value".to_string(),
            })?;
            Ok(left == right)
        }
    }
}

fn leaf_ordering(
    actual: &Value,
    value: &serde_json::Value,
    field_type: FieldType,
    operator: Operator,
) -> Result<bool, ConditionFault> {
    match field_type {
        FieldType::Number => {
            let left = actual.as_number().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("expected a numeric field, got {}", actual.type_name()),
            })?;
            let right = coerce_number(value)?;
            Ok(apply_ordering(operator, left.cmp(&right)))
        }
        FieldType::Text => {
            let left = actual.as_text().ok_or_else(|| ConditionFault::TypeMismatch {
                message: format!("expected a text field, got {}", actual.type_name()),
            })?;
            let right = value.as_str().ok_or_else(|| ConditionFault::BadValue {
                message: "expected a string condition value".to_string(),
            })?;
            Ok(apply_ordering(operator, left.cmp(right)))
        }
        FieldType::Boolean => Err(ConditionFault::UnsupportedOperator {
            operator,
            kind: field_type,
        }),
    }
}

fn apply_ordering(operator: Operator, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering;
    match operator {
        Operator::Gt => ord == Ordering::Greater,
        Operator::Gte => ord != Ordering::Less,
        Operator::Lt => ord == Ordering::Less,
        Operator::Lte => ord != Ordering::Greater,
        _ => unreachable!("apply_ordering called with non-ordering operator"),
    }
}

fn leaf_membership(
    actual: &Value,
    value: &serde_json::Value,
    field_type: FieldType,
) -> Result<bool, ConditionFault> {
    let items = value.as_array().ok_or_else(|| ConditionFault::BadValue {
        message: "in/not_in needs a list condition value".to_string(),
    })?;
    for item in items {
        if scalar_eq(actual, item, field_type)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Coerce a JSON condition value to a Decimal: numbers directly, numeric
/// strings by parsing.
fn coerce_number(value: &serde_json::Value) -> Result<Decimal, ConditionFault> {
    if let Some(i) = value.as_i64() {
        return Ok(Decimal::from(i));
    }
    if let Some(f) = value.as_f64() {
        return Decimal::from_f64(f).ok_or_else(|| ConditionFault::BadValue {
            message: format!("{} is not representable", f),
        });
    }
    if let Some(s) = value.as_str() {
        return s.parse::<Decimal>().map_err(|_| ConditionFault::BadValue {
            message: format!("'{}' is not a number", s),
        });
    }
    Err(ConditionFault::BadValue {
        message: "expected a numeric condition value".to_string(),
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
