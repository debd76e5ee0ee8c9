//! Row codec: name-keyed caller documents to identity-keyed stored rows and
//! back.

use serde_json::{Map, Value as Json};

use crate::catalog::{Field, Schema};
use crate::error::EncodingError;
use crate::types::{Document, FieldType, Row, Value};

use super::coerce::is_numeric;

/// A row produced by [`encode_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub row: Row,
    /// True if an auto-increment counter was consumed, which changes the
    /// schema that has to be persisted.
    pub consumed_counter: bool,
}

/// Encode a document against `schema`, field by field in schema order.
///
/// A field missing from `doc` takes its default; without one it must be
/// nullable or auto-incrementing. Auto-incrementing `index` fields always
/// take the next counter value, whatever the document says. Counters are
/// only taken once every field has been validated, so a rejected document
/// leaves the schema untouched.
pub fn encode_row(schema: &mut Schema, doc: &Map<String, Json>) -> Result<EncodedRow, EncodingError> {
    let mut row = Row::new();
    let mut counters = Vec::new();

    for (name, field) in schema.iter() {
        let value = doc.get(name).or(field.default.as_ref());
        if value.is_none() && !field.nullable && !field.auto_increment {
            return Err(EncodingError::RequiredFieldMissing(name.clone()));
        }

        match field.field_type {
            Some(FieldType::Index) => {
                if let Some(v) = value.filter(|v| !v.is_null()) {
                    if !is_numeric(v) {
                        return Err(EncodingError::invalid(name, "a number"));
                    }
                }
                if !field.auto_increment {
                    return Err(EncodingError::UnresolvableIndex(name.clone()));
                }
                counters.push(name.clone());
            }
            _ => {
                row.insert(field.id, encode_value(name, field, value.unwrap_or(&Json::Null))?);
            }
        }
    }

    for name in &counters {
        if let Some(field) = schema.get_mut(name) {
            row.insert(field.id, Value::Int(take_next(field)));
        }
    }

    Ok(EncodedRow {
        row,
        consumed_counter: !counters.is_empty(),
    })
}

/// Encode a single value for `field` without touching counters.
///
/// Explicit `null` is refused for non-nullable fields, except booleans where
/// it means `false`.
pub fn encode_value(name: &str, field: &Field, value: &Json) -> Result<Value, EncodingError> {
    if value.is_null()
        && !field.nullable
        && !field.auto_increment
        && field.field_type != Some(FieldType::Boolean)
    {
        return Err(EncodingError::RequiredFieldMissing(name.to_string()));
    }

    match field.field_type {
        Some(t) => t.coerce(name, value),
        None => Value::from_json(value).ok_or_else(|| EncodingError::invalid(name, "a scalar value")),
    }
}

/// Hand out the field's next counter value and advance it.
pub(crate) fn take_next(field: &mut Field) -> i64 {
    let next = field.next_value.unwrap_or(1);
    field.next_value = Some(next + 1);
    next as i64
}

/// Decode a stored row into a document holding every current schema field
/// whose identity is present in the row.
pub fn decode_row(schema: &Schema, row: Option<&Row>) -> Option<Document> {
    let row = row?;
    let doc = schema
        .iter()
        .filter_map(|(name, field)| row.get(&field.id).map(|v| (name.clone(), v.clone())))
        .collect();
    Some(doc)
}
