use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::catalog::ops as catalog_ops;
use crate::catalog::{Field, Schema, SchemaDefinition, TableDescriptor};
use crate::encoding::row::take_next;
use crate::encoding::{decode_row, encode_row, encode_value};
use crate::error::{EncodingError, Error, Result, SchemaError};
use crate::storage::{Snapshot, Storage, StorageState};
use crate::types::{Document, FieldId, Row, RowIndex, TableData, Value};

use super::builders::{FindBuilder, TableBuilder};
use super::filter::{loose_eq, order_values};
use super::query::{Direction, Lookup, Query};

pub(crate) type TableHandle = Arc<Mutex<TableState>>;

/// Mutable state of one table, guarded by the table lock.
pub(crate) struct TableState {
    name: String,
    schema: Schema,
    checksum: u64,
    /// Next field identity to hand out.
    last_field_id: FieldId,
    /// Next row index for tables without a primary index field.
    next_row: RowIndex,
    /// Set when the persisted descriptor is stale.
    pending_schema_save: bool,
    storage: Option<Storage>,
}

impl TableState {
    fn new(name: String) -> Self {
        Self {
            name,
            schema: Schema::new(),
            checksum: 0,
            last_field_id: 0,
            next_row: 0,
            pending_schema_save: true,
            storage: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    pub(crate) fn set_storage(&mut self, storage: Storage) {
        self.storage = Some(storage);
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.pending_schema_save = true;
    }

    /// Reconcile the working schema with the descriptor cached in `snapshot`
    /// under this table's name, purging removed columns from its rows.
    pub(crate) fn reconcile(&mut self, snapshot: Option<&mut Snapshot>) {
        let (cached, data) = match snapshot {
            Some(Snapshot { tables, data }) => (tables.get(&self.name), data.get_mut(&self.name)),
            None => (None, None),
        };

        let reconciled = catalog_ops::reconcile(&self.name, &mut self.schema, cached, data);
        self.last_field_id = reconciled.last_field_id;
        self.checksum = reconciled.checksum;
        if let Some(cached) = cached {
            self.next_row = cached.next_row;
        }
        self.pending_schema_save = true;
    }

    /// Write the descriptor into `snapshot` if it is stale.
    fn sync(&mut self, snapshot: &mut Snapshot) {
        if self.pending_schema_save {
            snapshot.tables.insert(
                self.name.clone(),
                TableDescriptor {
                    last_field_id: self.last_field_id,
                    checksum: self.checksum,
                    schema: self.schema.clone(),
                    next_row: self.next_row,
                },
            );
        }
        self.pending_schema_save = false;
    }

    /// Register, sync, make sure a row container exists, persist.
    fn save(&mut self, handle: &TableHandle, storage: &Storage, state: &mut StorageState) -> Result<()> {
        state.register(handle);
        let snapshot = state.snapshot_mut();
        self.sync(snapshot);
        snapshot.rows_mut(&self.name);
        storage.persist(state)?;
        Ok(())
    }

    fn field(&self, name: &str) -> Result<&Field> {
        self.schema.get(name).ok_or_else(|| {
            SchemaError::UnknownField {
                table: self.name.clone(),
                field: name.to_string(),
            }
            .into()
        })
    }

    /// Pick the index under which `row` is stored.
    ///
    /// With a primary index field, a truthy value already in the row wins,
    /// otherwise the field's counter is consumed. An index that is already
    /// taken (rows stored before the field existed) moves past the highest
    /// stored index; the row and the counter follow. Without a primary index
    /// field, the table's row counter is used, never going below the highest
    /// stored index.
    fn unique_index_for(&mut self, row: &mut Row, rows: &TableData) -> RowIndex {
        let floor = rows.keys().next_back().map_or(0, |last| last + 1);

        if let Some(field) = self.schema.values_mut().find(|f| f.is_primary_index()) {
            let supplied = row
                .get(&field.id)
                .filter(|v| v.is_truthy())
                .and_then(Value::as_i64)
                .and_then(|i| RowIndex::try_from(i).ok());
            let mut index = match supplied {
                Some(index) => index,
                None => take_next(field) as RowIndex,
            };
            if rows.contains_key(&index) {
                index = floor;
                field.next_value = Some(field.next_value.unwrap_or(1).max(index + 1));
                debug!(table = %self.name, index, "index taken, moved past stored rows");
            }
            row.insert(field.id, Value::Int(index as i64));
            self.pending_schema_save = true;
            return index;
        }

        let index = self.next_row.max(floor);
        self.next_row = index + 1;
        self.pending_schema_save = true;
        index
    }

    /// Rows matching `query`, in result order.
    fn select<'a>(&self, rows: &'a TableData, query: &Query) -> Result<Vec<(RowIndex, &'a Row)>> {
        let constraints = query
            .filter
            .iter()
            .map(|(name, value)| Ok((self.field(name)?.id, value)))
            .collect::<Result<Vec<(FieldId, &Json)>>>()?;
        let order = match &query.order {
            Some(order) => Some((self.field(&order.field)?.id, order.direction)),
            None => None,
        };
        let limit = query.max_results();

        let matched = rows.iter().filter(|(_, row)| {
            constraints
                .iter()
                .all(|(id, expected)| loose_eq(row.get(id), expected))
        });

        let selected = match order {
            None => matched.take(limit).map(|(i, row)| (*i, row)).collect(),
            Some((id, direction)) => {
                let mut all: Vec<(RowIndex, &Row)> = matched.map(|(i, row)| (*i, row)).collect();
                all.sort_by(|(_, a), (_, b)| {
                    let ordering = order_values(a.get(&id), b.get(&id));
                    match direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    }
                });
                all.truncate(limit);
                all
            }
        };

        Ok(selected)
    }

    fn query(&self, snapshot: Option<&Snapshot>, query: &Query) -> Result<Vec<Document>> {
        let Some(rows) = snapshot.and_then(|s| s.rows(&self.name)) else {
            return Ok(Vec::new());
        };
        let selected = self.select(rows, query)?;
        Ok(selected
            .into_iter()
            .filter_map(|(_, row)| decode_row(&self.schema, Some(row)))
            .collect())
    }
}

/// A table handle.
///
/// `Table` is cheaply clonable (`Arc`-based); clones share one schema and
/// counters. A table may exist without a storage, but reading and writing
/// rows requires one.
#[derive(Clone)]
pub struct Table {
    inner: TableHandle,
}

impl Table {
    /// Create a table from `schema`. With a storage, the schema is reconciled
    /// against whatever that storage has cached under `name` and persisted.
    pub fn new(
        name: impl Into<String>,
        schema: &SchemaDefinition,
        storage: Option<&Storage>,
    ) -> Result<Self> {
        let mut state = TableState::new(name.into());
        state.storage = storage.cloned();
        let table = Self::from_handle(Arc::new(Mutex::new(state)));
        table.set_schema(schema)?;
        Ok(table)
    }

    /// Start building a table field by field.
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name.into())
    }

    pub(crate) fn from_handle(inner: TableHandle) -> Self {
        Self { inner }
    }

    pub(crate) fn handle(&self) -> &TableHandle {
        &self.inner
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    /// The live schema, including field identities and counters.
    pub fn schema(&self) -> Schema {
        self.inner.lock().schema.clone()
    }

    pub fn checksum(&self) -> u64 {
        self.inner.lock().checksum
    }

    /// Next field identity the table would hand out.
    pub fn last_field_id(&self) -> FieldId {
        self.inner.lock().last_field_id
    }

    pub fn storage(&self) -> Option<Storage> {
        self.inner.lock().storage.clone()
    }

    /// True if the attached storage holds a descriptor for this table.
    pub fn is_cached(&self) -> bool {
        let table = self.inner.lock();
        let Some(storage) = table.storage.as_ref() else {
            return false;
        };
        let state = storage.lock();
        state
            .snapshot()
            .is_some_and(|s| s.descriptor(&table.name).is_some())
    }

    pub fn has_primary_index_field(&self) -> bool {
        self.primary_index_field().is_some()
    }

    /// Name of the primary, auto-incrementing `index` field, if any.
    pub fn primary_index_field(&self) -> Option<String> {
        let table = self.inner.lock();
        catalog_ops::primary_index_field(&table.schema).map(|(name, _)| name.clone())
    }

    /// Attach to `storage`, reconcile against its cached descriptor and
    /// persist.
    pub fn attach(&self, storage: &Storage) -> Result<()> {
        self.inner.lock().storage = Some(storage.clone());
        self.with_storage(|table, storage, state| {
            table.reconcile(Some(state.snapshot_mut()));
            table.save(&self.inner, storage, state)
        })
    }

    /// Replace the schema. Field identities and counters are carried over by
    /// name from the cached descriptor; columns of removed fields are purged.
    /// Persists when attached.
    pub fn set_schema(&self, schema: &SchemaDefinition) -> Result<()> {
        let mut table = self.inner.lock();
        table.schema = catalog_ops::build_schema(schema);

        let Some(storage) = table.storage.clone() else {
            table.reconcile(None);
            return Ok(());
        };
        let mut state = storage.lock();
        table.reconcile(Some(state.snapshot_mut()));
        table.save(&self.inner, &storage, &mut state)
    }

    /// Reconcile the current schema with the attached storage without
    /// persisting.
    pub fn load(&self) -> Result<()> {
        let mut table = self.inner.lock();
        match table.storage.clone() {
            Some(storage) => {
                let mut state = storage.lock();
                table.reconcile(Some(state.snapshot_mut()));
            }
            None => table.reconcile(None),
        }
        Ok(())
    }

    /// Start building a query against this table.
    pub fn query(&self) -> FindBuilder<'_> {
        FindBuilder::new(self)
    }

    /// Every row, decoded.
    pub fn all(&self) -> Result<Vec<Document>> {
        self.find(&Query::new())
    }

    /// All rows matching `query`. No match is an empty list, not an error.
    pub fn find(&self, query: &Query) -> Result<Vec<Document>> {
        self.with_storage(|table, _, state| table.query(state.snapshot(), query))
    }

    /// One row: by row index, or the first match of a query.
    pub fn find_one(&self, lookup: impl Into<Lookup>) -> Result<Option<Document>> {
        match lookup.into() {
            Lookup::Index(index) => self.with_storage(|table, _, state| {
                let row = RowIndex::try_from(index).ok().and_then(|index| {
                    state
                        .snapshot()
                        .and_then(|s| s.rows(&table.name))
                        .and_then(|rows| rows.get(&index))
                });
                Ok(decode_row(&table.schema, row))
            }),
            Lookup::Query(query) => Ok(self.find(&query.limit(1))?.into_iter().next()),
        }
    }

    /// Insert one document (a JSON object) or a batch (an array of objects).
    ///
    /// Each document is stored and persisted on its own: when a batch fails
    /// part way, the documents before the failing one stay inserted.
    /// Returns the stored rows.
    pub fn insert(&self, data: Json) -> Result<Vec<Row>> {
        match data {
            Json::Object(doc) => Ok(vec![self.insert_one(&doc)?]),
            Json::Array(items) => items
                .iter()
                .map(|item| match item {
                    Json::Object(doc) => self.insert_one(doc),
                    other => Err(EncodingError::NotAnObject(json_kind(other)).into()),
                })
                .collect(),
            other => Err(EncodingError::NotAnObject(json_kind(&other)).into()),
        }
    }

    /// Insert a single document and return the stored row.
    pub fn insert_one(&self, doc: &Map<String, Json>) -> Result<Row> {
        self.with_storage(|table, storage, state| {
            let mut encoded = encode_row(&mut table.schema, doc)?;
            if encoded.consumed_counter {
                table.pending_schema_save = true;
            }

            let rows = state.snapshot_mut().rows_mut(&table.name);
            let index = table.unique_index_for(&mut encoded.row, rows);
            rows.insert(index, encoded.row.clone());
            debug!(table = %table.name, index, "inserted row");

            table.save(&self.inner, storage, state)?;
            Ok(encoded.row)
        })
    }

    /// Overwrite the fields named in `data` on every row matching `filter`
    /// (every row for an empty query). Returns the updated rows.
    pub fn update(&self, data: Json, filter: &Query) -> Result<Vec<Row>> {
        let patch = match data {
            Json::Object(patch) => patch,
            other => return Err(EncodingError::NotAnObject(json_kind(&other)).into()),
        };

        self.with_storage(|table, storage, state| {
            let patch = patch
                .iter()
                .map(|(name, value)| -> Result<(FieldId, Value)> {
                    let field = table.field(name)?;
                    Ok((field.id, encode_value(name, field, value)?))
                })
                .collect::<Result<Vec<_>>>()?;

            let indexes: Vec<RowIndex> = match state.snapshot().and_then(|s| s.rows(&table.name)) {
                Some(rows) => table
                    .select(rows, filter)?
                    .into_iter()
                    .map(|(index, _)| index)
                    .collect(),
                None => Vec::new(),
            };

            let rows = state.snapshot_mut().rows_mut(&table.name);
            let mut updated = Vec::with_capacity(indexes.len());
            for index in indexes {
                if let Some(row) = rows.get_mut(&index) {
                    for (id, value) in &patch {
                        row.insert(*id, value.clone());
                    }
                    updated.push(row.clone());
                }
            }
            debug!(table = %table.name, rows = updated.len(), "updated rows");

            table.save(&self.inner, storage, state)?;
            Ok(updated)
        })
    }

    /// Register with the storage, sync the descriptor and persist.
    pub fn save(&self) -> Result<()> {
        self.with_storage(|table, storage, state| table.save(&self.inner, storage, state))
    }

    /// Write the descriptor into the in-memory snapshot if it is stale.
    pub fn sync(&self) -> Result<()> {
        self.with_storage(|table, _, state| {
            table.sync(state.snapshot_mut());
            Ok(())
        })
    }

    /// Drop this table from its storage, rows included.
    pub fn drop_table(&self) -> Result<()> {
        let storage = self.storage().ok_or_else(|| SchemaError::Detached(self.name()))?;
        storage.drop_table(self)
    }

    /// Run `f` with the table lock and then the storage lock held.
    fn with_storage<R>(
        &self,
        f: impl FnOnce(&mut TableState, &Storage, &mut StorageState) -> Result<R>,
    ) -> Result<R> {
        let mut table = self.inner.lock();
        let storage = table
            .storage
            .clone()
            .ok_or_else(|| Error::from(SchemaError::Detached(table.name.clone())))?;
        let mut state = storage.lock();
        f(&mut table, &storage, &mut state)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.lock();
        f.debug_struct("Table")
            .field("name", &table.name)
            .field("fields", &table.schema.len())
            .field("attached", &table.storage.is_some())
            .finish()
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
