//! Runtime context values.
//!
//! All numeric values are `i64` or `rust_decimal::Decimal` -- never `f64`
//! in the evaluation path.

use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// A typed value held in a listing context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "Text",
            Value::List(_) => "List",
            Value::Record(_) => "Record",
        }
    }

    /// Numeric view: `Int` promotes to `Decimal`.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text rendering used for case-insensitive modifier matching:
    /// scalars render to their display form, composites to `None`.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::List(_) | Value::Record(_) => None,
        }
    }

    /// Convert a JSON value. Nulls have no context representation and
    /// return `None` (their key is simply omitted).
    pub fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().and_then(Decimal::from_f64).map(Value::Decimal)
                }
            }
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(items) => Some(Value::List(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(obj) => {
                let mut fields = BTreeMap::new();
                for (k, item) in obj {
                    if let Some(val) = Value::from_json(item) {
                        fields.insert(k.clone(), val);
                    }
                }
                Some(Value::Record(fields))
            }
        }
    }

    /// Convert back to JSON for output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::json!(b),
            Value::Int(i) => serde_json::json!(i),
            Value::Decimal(d) => serde_json::json!(d.to_string()),
            Value::Text(s) => serde_json::json!(s),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => {
                let mut map = serde_json::Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn from_json_integer_stays_int() {
        assert_eq!(
            Value::from_json(&serde_json::json!(32)),
            Some(Value::Int(32))
        );
    }

    #[test]
    fn from_json_float_becomes_decimal() {
        assert_eq!(
            Value::from_json(&serde_json::json!(2.5)),
            Some(Value::Decimal(dec("2.5")))
        );
    }

    #[test]
    fn from_json_null_is_omitted() {
        assert_eq!(Value::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn from_json_object_drops_null_members() {
        let v = Value::from_json(&serde_json::json!({"a": 1, "b": null})).unwrap();
        match v {
            Value::Record(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields.get("a"), Some(&Value::Int(1)));
            }
            other => panic!("expected Record, got {:?}", other),
        }
    }

    #[test]
    fn as_number_promotes_int() {
        assert_eq!(Value::Int(5).as_number(), Some(dec("5")));
        assert_eq!(Value::Decimal(dec("1.5")).as_number(), Some(dec("1.5")));
        assert_eq!(Value::Text("5".to_string()).as_number(), None);
    }

    #[test]
    fn render_scalars() {
        assert_eq!(Value::Int(32).render(), Some("32".to_string()));
        assert_eq!(Value::Bool(true).render(), Some("true".to_string()));
        assert_eq!(
            Value::Text("used".to_string()).render(),
            Some("used".to_string())
        );
        assert_eq!(Value::List(vec![]).render(), None);
    }
}
