use serde_json::Value as Json;

use crate::catalog::{FieldDef, SchemaDefinition};
use crate::error::Error;
use crate::storage::Storage;
use crate::types::{Document, Row};

use super::query::{Direction, Query};
use super::table::Table;

// ---------------------------------------------------------------------------
// TableBuilder
// ---------------------------------------------------------------------------

/// Builder for creating a table field by field.
pub struct TableBuilder {
    name: String,
    schema: SchemaDefinition,
    storage: Option<Storage>,
}

impl TableBuilder {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            schema: SchemaDefinition::new(),
            storage: None,
        }
    }

    /// Append a field. Redefining a name replaces the definition in place.
    pub fn field(mut self, name: &str, def: FieldDef) -> Self {
        self.schema.insert(name.to_string(), def);
        self
    }

    /// Append every field of `schema`.
    pub fn schema(mut self, schema: SchemaDefinition) -> Self {
        self.schema.extend(schema);
        self
    }

    /// Attach the table to `storage`.
    pub fn storage(mut self, storage: &Storage) -> Self {
        self.storage = Some(storage.clone());
        self
    }

    /// Create the table. With a storage, reconcile and persist its schema.
    pub fn build(self) -> Result<Table, Error> {
        Table::new(self.name, &self.schema, self.storage.as_ref())
    }
}

// ---------------------------------------------------------------------------
// FindBuilder
// ---------------------------------------------------------------------------

/// Builder for a query against one table.
pub struct FindBuilder<'a> {
    table: &'a Table,
    query: Query,
}

impl<'a> FindBuilder<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            query: Query::new(),
        }
    }

    /// Require `field` to loosely equal `value`.
    pub fn where_eq(mut self, field: &str, value: impl Into<Json>) -> Self {
        self.query = self.query.where_eq(field, value);
        self
    }

    /// Stop after `limit` matches. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.query = self.query.order_by(field, direction);
        self
    }

    /// Execute and return every match.
    pub fn execute(self) -> Result<Vec<Document>, Error> {
        self.table.find(&self.query)
    }

    /// Execute and return the first match.
    pub fn first(self) -> Result<Option<Document>, Error> {
        self.table.find_one(self.query)
    }

    /// Overwrite the fields of `data` on every match.
    pub fn update(self, data: Json) -> Result<Vec<Row>, Error> {
        self.table.update(data, &self.query)
    }
}
