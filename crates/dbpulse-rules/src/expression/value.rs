//! Value semantics for the expression interpreter: truthiness, numeric
//! coercion, equality, ordering, and string conversion over JSON values.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use dbpulse_core::errors::ExpressionError;

/// A numeric operand. Booleans coerce to `Int(0 | 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn from_value(value: &Value) -> Option<Num> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Number(n) => Some(Num::from_number(n)),
            _ => None,
        }
    }

    pub fn from_number(n: &Number) -> Num {
        match n.as_i64() {
            Some(i) => Num::Int(i),
            None => Num::Float(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }

    pub fn into_value(self) -> Result<Value, ExpressionError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ExpressionError::Value(format!("non-finite result {f}"))),
        }
    }

    pub fn compare(self, other: Num) -> Ordering {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.cmp(&b),
            (a, b) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

/// Python-style type name, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => !Num::from_number(n).is_zero(),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Equality with numeric promotion (`1 == 1.0`, `True == 1`).
pub fn py_eq(left: &Value, right: &Value) -> bool {
    match (Num::from_value(left), Num::from_value(right)) {
        (Some(a), Some(b)) => a.compare(b) == Ordering::Equal && !a.as_f64().is_nan(),
        _ => match (left, right) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| py_eq(x, y))
            }
            _ => left == right,
        },
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`: numbers, strings, and lists of those.
pub fn py_cmp(left: &Value, right: &Value) -> Result<Ordering, ExpressionError> {
    if let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) {
        return Ok(a.compare(b));
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = py_cmp(x, y)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(ExpressionError::Type(format!(
            "ordering not supported between {} and {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

/// Membership test for `in`.
pub fn py_contains(container: &Value, item: &Value) -> Result<bool, ExpressionError> {
    match container {
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ExpressionError::Type(format!(
                "'in <str>' requires str as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::Array(items) => Ok(items.iter().any(|v| py_eq(v, item))),
        Value::Object(map) => match item {
            Value::String(key) => Ok(map.contains_key(key)),
            _ => Ok(false),
        },
        other => Err(ExpressionError::Type(format!(
            "argument of type {} is not iterable",
            type_name(other)
        ))),
    }
}

/// `str(value)` with Python formatting for scalars.
pub fn py_str(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match Num::from_number(n) {
            Num::Int(i) => i.to_string(),
            Num::Float(f) => float_str(f),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Python `repr`-like float text: integral values keep a trailing `.0`.
pub fn float_str(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("0")));
    }

    #[test]
    fn test_numeric_equality_promotes() {
        assert!(py_eq(&json!(1), &json!(1.0)));
        assert!(py_eq(&json!(true), &json!(1)));
        assert!(!py_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_ordering_type_error() {
        assert!(py_cmp(&json!(null), &json!(5)).is_err());
        assert_eq!(py_cmp(&json!("a"), &json!("b")).unwrap(), Ordering::Less);
        assert_eq!(py_cmp(&json!(2.5), &json!(2)).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_py_str() {
        assert_eq!(py_str(&json!(3.0)), "3.0");
        assert_eq!(py_str(&json!(0.25)), "0.25");
        assert_eq!(py_str(&json!(null)), "None");
        assert_eq!(py_str(&json!(false)), "False");
    }
}
