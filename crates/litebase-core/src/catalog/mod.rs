//! Table catalog: field definitions, persisted descriptors and schema
//! reconciliation.

pub mod ops;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::types::{FieldId, FieldType, RowIndex};

/// A caller-supplied field definition.
///
/// Deserializes from the documented JSON shape
/// `{"type": ..., "autoIncrement": ..., "primary": ..., "null": ..., "default": ...}`
/// where every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(rename = "type", default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub auto_increment: Option<bool>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(rename = "null", default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<Json>,
}

impl FieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Self::default()
        }
    }

    /// A primary, auto-incrementing `index` field.
    pub fn primary_index() -> Self {
        Self::new(FieldType::Index).primary()
    }

    pub fn primary(mut self) -> Self {
        self.primary = Some(true);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = Some(true);
        self
    }

    /// Reject documents that omit this field (unless a default exists).
    pub fn required(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn default_value(mut self, value: impl Into<Json>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A table schema as supplied by the caller, in declaration order.
pub type SchemaDefinition = IndexMap<String, FieldDef>;

/// A field of a live or persisted schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub auto_increment: bool,
    pub primary: bool,
    #[serde(rename = "null")]
    pub nullable: bool,
    pub default: Option<Json>,
    /// Stable identity used as the row key for this field.
    pub id: FieldId,
    /// Next value handed out by an auto-incrementing field.
    pub next_value: Option<u64>,
}

impl Field {
    /// Merge a definition over the defaults: nullable, not auto-incrementing,
    /// not primary. `index` fields always auto-increment.
    pub fn from_def(def: &FieldDef) -> Self {
        let auto_increment =
            def.field_type == Some(FieldType::Index) || def.auto_increment.unwrap_or(false);
        Self {
            field_type: def.field_type,
            auto_increment,
            primary: def.primary.unwrap_or(false),
            nullable: def.nullable.unwrap_or(true),
            default: def.default.clone(),
            id: 0,
            next_value: auto_increment.then_some(1),
        }
    }

    /// True for the kind of field that supplies row indexes.
    pub fn is_primary_index(&self) -> bool {
        self.field_type == Some(FieldType::Index) && self.primary && self.auto_increment
    }
}

/// A live schema: field name → field, in declaration order.
pub type Schema = IndexMap<String, Field>;

/// The persisted description of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Next field identity to hand out.
    pub last_field_id: FieldId,
    pub checksum: u64,
    pub schema: Schema,
    /// Row counter for tables without a primary index field.
    #[serde(default)]
    pub next_row: RowIndex,
}
