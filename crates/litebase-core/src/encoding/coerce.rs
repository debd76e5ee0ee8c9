//! Per-type coercion of caller-supplied JSON values into stored [`Value`]s.
//!
//! Numeric types accept JSON numbers and numeric strings (surrounding
//! whitespace ignored). `null` coerces to [`Value::Null`] for every type except
//! `boolean`, where it means `false`; whether `null` is allowed at all is the
//! row encoder's concern.

use std::str::FromStr;

use num_bigint::BigInt;
use serde_json::Value as Json;

use crate::error::EncodingError;
use crate::types::{FieldType, Value};

impl FieldType {
    /// Coerce `value` into this type's stored representation.
    ///
    /// `field` is only used for error reporting.
    pub fn coerce(self, field: &str, value: &Json) -> Result<Value, EncodingError> {
        if value.is_null() {
            return Ok(match self {
                FieldType::Boolean => Value::Bool(false),
                _ => Value::Null,
            });
        }

        match self {
            FieldType::Index | FieldType::Int => coerce_int(field, value),
            FieldType::Float => coerce_float(field, value),
            FieldType::BigInt => coerce_bigint(field, value),
            FieldType::Binary => coerce_binary(field, value),
            FieldType::Boolean => coerce_boolean(field, value),
            FieldType::String | FieldType::Enum => {
                Value::from_json(value).ok_or_else(|| EncodingError::invalid(field, "a scalar value"))
            }
        }
    }
}

/// Returns true if `value` is a number or a string holding one.
pub fn is_numeric(value: &Json) -> bool {
    match value {
        Json::Number(_) => true,
        Json::String(s) => parse_f64(s).is_some(),
        _ => false,
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| !f.is_nan())
}

fn truncate(field: &str, f: f64) -> Result<Value, EncodingError> {
    let t = f.trunc();
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(EncodingError::invalid(field, "an integer in the i64 range"));
    }
    Ok(Value::Int(t as i64))
}

fn coerce_int(field: &str, value: &Json) -> Result<Value, EncodingError> {
    match value {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else {
                truncate(field, n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Ok(Value::Int(i));
            }
            let f = parse_f64(s).ok_or_else(|| EncodingError::invalid(field, "a number"))?;
            truncate(field, f)
        }
        _ => Err(EncodingError::invalid(field, "a number")),
    }
}

fn coerce_float(field: &str, value: &Json) -> Result<Value, EncodingError> {
    let f = match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => parse_f64(s),
        _ => None,
    };
    f.map(Value::Float)
        .ok_or_else(|| EncodingError::invalid(field, "a number"))
}

fn coerce_bigint(field: &str, value: &Json) -> Result<Value, EncodingError> {
    let big = match value {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(BigInt::from(u))
            } else {
                // Integral floats have an exact decimal expansion.
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .and_then(|f| BigInt::from_str(&format!("{f:.0}")).ok())
            }
        }
        Json::String(s) => BigInt::from_str(s.trim()).ok(),
        _ => None,
    };
    big.map(Value::BigInt)
        .ok_or_else(|| EncodingError::invalid(field, "an integer"))
}

/// Arrays become bytes element by element. Other scalars, strings included,
/// are stored unchanged so they still compare equal to what was inserted.
fn coerce_binary(field: &str, value: &Json) -> Result<Value, EncodingError> {
    match value {
        Json::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let byte = match coerce_int(field, item)? {
                    Value::Int(i) => u8::try_from(i).ok(),
                    _ => None,
                };
                bytes.push(byte.ok_or_else(|| EncodingError::invalid(field, "bytes in 0..=255"))?);
            }
            Ok(Value::Binary(bytes))
        }
        other => Value::from_json(other).ok_or_else(|| EncodingError::invalid(field, "a byte array")),
    }
}

fn coerce_boolean(field: &str, value: &Json) -> Result<Value, EncodingError> {
    match value {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::String(s) => Ok(Value::Bool(s == "1" || s.eq_ignore_ascii_case("true"))),
        Json::Number(n) => Ok(Value::Bool(n.as_f64() == Some(1.0))),
        _ => Err(EncodingError::invalid(field, "a boolean")),
    }
}
