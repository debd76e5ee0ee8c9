//! Core types: field identities, row indexes, field types and stored values.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Stable identifier of a schema field. Rows are keyed by it instead of the
/// field name, so renaming or removing unrelated fields never touches them.
pub type FieldId = u32;

/// Row identifier inside one table.
pub type RowIndex = u64;

/// A stored row: field identity → value.
pub type Row = BTreeMap<FieldId, Value>;

/// All rows of one table, iterated in ascending row index order.
pub type TableData = BTreeMap<RowIndex, Row>;

/// A decoded row: field name → value, in schema order.
pub type Document = IndexMap<String, Value>;

/// The semantic type of a table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Row identifier. Always auto-incrementing.
    Index,
    String,
    Int,
    Float,
    BigInt,
    Binary,
    Enum,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Index => "index",
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::BigInt => "bigint",
            FieldType::Binary => "binary",
            FieldType::Enum => "enum",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar value as stored in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    BigInt(BigInt),
    String(String),
    Binary(Vec<u8>),
}

impl Value {
    /// Convert a scalar JSON value without any type coercion.
    ///
    /// Integers that do not fit in `i64` become [`Value::BigInt`]. Arrays and
    /// objects have no scalar form and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Value::BigInt(BigInt::from(u)))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::BigInt(b) => i64::try_from(b).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::BigInt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// JavaScript-style truthiness: null, false, zero, NaN and the empty
    /// string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::BigInt(b) => *b != BigInt::from(0),
            Value::String(s) => !s.is_empty(),
            Value::Binary(_) => true,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::BigInt(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

/// Lossy conversion for handing rows back to JSON-speaking callers.
/// Big integers outside the `i64`/`u64` range become decimal strings.
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::BigInt(b) => {
                if let Ok(i) = i64::try_from(&b) {
                    serde_json::Value::from(i)
                } else if let Ok(u) = u64::try_from(&b) {
                    serde_json::Value::from(u)
                } else {
                    serde_json::Value::String(b.to_string())
                }
            }
            Value::String(s) => serde_json::Value::String(s),
            Value::Binary(bytes) => serde_json::Value::from(bytes),
        }
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Value::Int(i) if i == other)
    }
}

impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool {
        matches!(self, Value::Int(i) if *i == i64::from(*other))
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, Value::Float(f) if f == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!(true)), Some(Value::Bool(true)));
        assert_eq!(Value::from_json(&json!(-7)), Some(Value::Int(-7)));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(Value::from_json(&json!("x")), Some(Value::from("x")));
    }

    #[test]
    fn test_from_json_large_unsigned_is_bigint() {
        let v = Value::from_json(&json!(u64::MAX)).unwrap();
        assert_eq!(v, Value::BigInt(BigInt::from(u64::MAX)));
    }

    #[test]
    fn test_from_json_rejects_containers() {
        assert_eq!(Value::from_json(&json!([1, 2])), None);
        assert_eq!(Value::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(Value::Binary(vec![]).is_truthy());
    }

    #[test]
    fn test_into_json() {
        let big = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        assert_eq!(
            serde_json::Value::from(Value::BigInt(big)),
            json!("123456789012345678901234567890")
        );
        assert_eq!(serde_json::Value::from(Value::Binary(vec![1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_field_type_serde_names() {
        let t: FieldType = serde_json::from_value(json!("bigint")).unwrap();
        assert_eq!(t, FieldType::BigInt);
        assert_eq!(serde_json::to_value(FieldType::Index).unwrap(), json!("index"));
    }
}
