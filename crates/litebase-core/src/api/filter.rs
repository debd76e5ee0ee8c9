//! Value comparison for the query evaluator.
//!
//! Equality is loose: values of different types are compared after the same
//! conversions a dynamically typed caller would expect (`"1" == 1`,
//! `true == 1`, a missing field equals `null`).

use std::cmp::Ordering;
use std::str::FromStr;

use num_bigint::BigInt;
use serde_json::Value as Json;

use crate::types::Value;

/// Loose equality between a stored value (`None` if the row lacks the field)
/// and a requested JSON value.
pub fn loose_eq(stored: Option<&Value>, expected: &Json) -> bool {
    let stored = stored.unwrap_or(&Value::Null);

    match (stored, expected) {
        (Value::Null, Json::Null) => true,
        (Value::Null, _) | (_, Json::Null) => false,
        (_, Json::Object(_)) => false,
        (Value::Binary(bytes), Json::Array(items)) => {
            bytes.len() == items.len()
                && bytes
                    .iter()
                    .zip(items)
                    .all(|(b, item)| loose_eq(Some(&Value::Int(i64::from(*b))), item))
        }
        (_, Json::Array(_)) | (Value::Binary(_), _) => false,
        (Value::String(a), Json::String(b)) => a == b,
        (Value::Int(a), Json::Number(n)) if n.as_i64().is_some() => n.as_i64() == Some(*a),
        (Value::BigInt(a), _) => json_to_bigint(expected).is_some_and(|b| *a == b),
        _ => match (value_to_f64(stored), json_to_f64(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Total order used to sort query results. Nulls and missing values come
/// first; values of unrelated types compare equal.
pub fn order_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);

    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
        (Value::BigInt(a), Value::Int(b)) => a.cmp(&BigInt::from(*b)),
        (Value::Int(a), Value::BigInt(b)) => BigInt::from(*a).cmp(b),
        (a, b) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Number conversion for loose comparison. An empty or blank string is zero.
fn str_to_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f64>().ok()
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => str_to_f64(s),
        Value::Null | Value::BigInt(_) | Value::Binary(_) => None,
    }
}

fn json_to_f64(value: &Json) -> Option<f64> {
    match value {
        Json::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Json::Number(n) => n.as_f64(),
        Json::String(s) => str_to_f64(s),
        _ => None,
    }
}

fn json_to_bigint(value: &Json) -> Option<BigInt> {
    match value {
        Json::Bool(b) => Some(BigInt::from(u8::from(*b))),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(BigInt::from(u))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .and_then(|f| BigInt::from_str(&format!("{f:.0}")).ok())
            }
        }
        Json::String(s) => BigInt::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_type_equality() {
        assert!(loose_eq(Some(&Value::from("a")), &json!("a")));
        assert!(!loose_eq(Some(&Value::from("a")), &json!("b")));
        assert!(loose_eq(Some(&Value::Int(2)), &json!(2)));
        assert!(loose_eq(Some(&Value::Bool(true)), &json!(true)));
        assert!(loose_eq(Some(&Value::Float(1.5)), &json!(1.5)));
    }

    #[test]
    fn test_cross_type_equality() {
        assert!(loose_eq(Some(&Value::Int(1)), &json!("1")));
        assert!(loose_eq(Some(&Value::from("2")), &json!(2)));
        assert!(loose_eq(Some(&Value::Bool(true)), &json!(1)));
        assert!(loose_eq(Some(&Value::Bool(false)), &json!("0")));
        assert!(loose_eq(Some(&Value::Int(2)), &json!(2.0)));
        assert!(!loose_eq(Some(&Value::Int(2)), &json!("two")));
    }

    #[test]
    fn test_null_and_missing() {
        assert!(loose_eq(None, &json!(null)));
        assert!(loose_eq(Some(&Value::Null), &json!(null)));
        assert!(!loose_eq(None, &json!(0)));
        assert!(!loose_eq(Some(&Value::Int(0)), &json!(null)));
        assert!(!loose_eq(Some(&Value::Bool(false)), &json!(null)));
    }

    #[test]
    fn test_bigint_equality() {
        let big = Value::BigInt(BigInt::from_str("123456789012345678901234567890").unwrap());
        assert!(loose_eq(Some(&big), &json!("123456789012345678901234567890")));
        assert!(loose_eq(Some(&Value::BigInt(BigInt::from(5))), &json!(5)));
        assert!(!loose_eq(Some(&Value::BigInt(BigInt::from(5))), &json!(5.5)));
    }

    #[test]
    fn test_binary_equality() {
        let bytes = Value::Binary(vec![1, 2, 3]);
        assert!(loose_eq(Some(&bytes), &json!([1, 2, 3])));
        assert!(!loose_eq(Some(&bytes), &json!([1, 2])));
        assert!(!loose_eq(Some(&bytes), &json!("123")));
    }

    #[test]
    fn test_order_values() {
        assert_eq!(order_values(None, Some(&Value::Int(0))), Ordering::Less);
        assert_eq!(order_values(Some(&Value::Int(2)), Some(&Value::Float(1.5))), Ordering::Greater);
        assert_eq!(order_values(Some(&Value::from("a")), Some(&Value::from("b"))), Ordering::Less);
        assert_eq!(
            order_values(Some(&Value::BigInt(BigInt::from(10))), Some(&Value::Int(3))),
            Ordering::Greater
        );
        assert_eq!(order_values(Some(&Value::from("a")), Some(&Value::Int(1))), Ordering::Equal);
    }
}
