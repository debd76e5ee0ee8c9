//! Storage engine: the in-memory snapshot of a database file and its
//! persistence.
//!
//! Every save re-encodes and rewrites the whole snapshot. There is no
//! incremental write path and no write-ahead log.

pub mod codec;
pub mod file;
pub mod snapshot;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::table::{Table, TableHandle, TableState};
use crate::catalog::TableDescriptor;
use crate::error::{Result, StorageError};

pub use codec::{Compression, MessagePackCodec, SnapshotCodec};
pub use file::SnapshotFile;
pub use snapshot::Snapshot;

/// Options for opening a database file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageOptions {
    pub compress: Compression,
    /// Delete any existing file and start from an empty snapshot.
    pub drop_schema: bool,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compress: impl Into<Compression>) -> Self {
        self.compress = compress.into();
        self
    }

    pub fn with_drop_schema(mut self, drop_schema: bool) -> Self {
        self.drop_schema = drop_schema;
        self
    }
}

/// Mutable storage state, guarded by the storage lock.
#[derive(Default)]
pub(crate) struct StorageState {
    snapshot: Option<Snapshot>,
    tables: Vec<Weak<Mutex<TableState>>>,
}

impl StorageState {
    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut Snapshot {
        self.snapshot.get_or_insert_with(Snapshot::default)
    }

    /// Register a table handle once.
    pub(crate) fn register(&mut self, handle: &TableHandle) {
        self.tables.retain(|t| t.strong_count() > 0);
        let target = Arc::downgrade(handle);
        if !self.tables.iter().any(|t| t.ptr_eq(&target)) {
            self.tables.push(target);
        }
    }

    fn unregister(&mut self, handle: &TableHandle) {
        let target = Arc::downgrade(handle);
        self.tables
            .retain(|t| t.strong_count() > 0 && !t.ptr_eq(&target));
    }

    fn live_tables(&self) -> Vec<TableHandle> {
        self.tables.iter().filter_map(Weak::upgrade).collect()
    }
}

struct StorageInner {
    file: SnapshotFile,
    options: StorageOptions,
    codec: Box<dyn SnapshotCodec>,
    state: Mutex<StorageState>,
}

/// Handle to an open database file.
///
/// `Storage` is cheaply clonable (`Arc`-based); clones share one snapshot.
/// Tables hold a clone and persist through it.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    /// Open `path` with the MessagePack codec.
    ///
    /// With `drop_schema` set, an existing file is deleted first. A missing
    /// file is initialized with an empty snapshot before loading.
    pub fn open(path: impl AsRef<Path>, options: StorageOptions) -> Result<Self> {
        Self::open_with_codec(path, options, MessagePackCodec)
    }

    /// Open `path`, serializing the snapshot with `codec`.
    pub fn open_with_codec(
        path: impl AsRef<Path>,
        options: StorageOptions,
        codec: impl SnapshotCodec + 'static,
    ) -> Result<Self> {
        let file = SnapshotFile::new(path.as_ref());

        if options.drop_schema && file.exists() {
            file.remove()?;
            info!(path = %file.path().display(), "dropped existing database file");
        }
        let create = options.drop_schema || !file.exists();

        let storage = Self {
            inner: Arc::new(StorageInner {
                file,
                options,
                codec: Box::new(codec),
                state: Mutex::new(StorageState::default()),
            }),
        };

        if create {
            storage.save()?;
            info!(path = %storage.path().display(), "created database file");
        }

        storage.load()?;
        Ok(storage)
    }

    /// Replace the in-memory snapshot with the file contents, then reconcile
    /// every registered table against it.
    pub fn load(&self) -> Result<()> {
        let bytes = self.inner.file.read()?;
        let snapshot = self
            .inner
            .options
            .compress
            .decompress(bytes)
            .and_then(|bytes| self.inner.codec.decode(&bytes))
            .inspect_err(|e| warn!(path = %self.path().display(), error = %e, "failed to load database"))?;

        info!(
            path = %self.path().display(),
            tables = snapshot.tables.len(),
            "loaded database"
        );

        let tables = {
            let mut state = self.inner.state.lock();
            state.snapshot = Some(snapshot);
            state.live_tables()
        };

        // Table lock first, then storage lock.
        for handle in tables {
            let mut table = handle.lock();
            let mut state = self.inner.state.lock();
            table.reconcile(Some(state.snapshot_mut()));
        }

        Ok(())
    }

    /// Persist the whole snapshot, creating an empty one if none exists.
    pub fn save(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.persist(&mut state)?;
        Ok(())
    }

    /// Save every registered table, then the storage itself.
    pub fn init(&self) -> Result<()> {
        let tables = self.inner.state.lock().live_tables();
        for handle in tables {
            Table::from_handle(handle).save()?;
        }
        self.save()
    }

    /// Register `table` with this storage. Registering twice is a no-op.
    ///
    /// A table without a storage is bound to this one, without persisting;
    /// the next [`init`](Self::init) or table save writes it out.
    pub fn create_table(&self, table: &Table) -> bool {
        let handle = table.handle();
        let mut table_state = handle.lock();
        if table_state.storage().is_none() {
            table_state.set_storage(self.clone());
        }
        self.inner.state.lock().register(handle);
        true
    }

    /// Remove a table's descriptor and rows, unregister it and persist.
    pub fn drop_table(&self, table: &Table) -> Result<()> {
        let handle = table.handle();
        let mut table_state = handle.lock();
        table_state.mark_dirty();

        let mut state = self.inner.state.lock();
        state.snapshot_mut().remove_table(table_state.name());
        state.unregister(handle);
        info!(table = table_state.name(), "dropped table");

        self.persist(&mut state)?;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().snapshot.is_some()
    }

    /// Names of all tables with a persisted descriptor.
    pub fn table_names(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .snapshot()
            .map(|s| s.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn descriptor(&self, table: &str) -> Option<TableDescriptor> {
        self.inner
            .state
            .lock()
            .snapshot()
            .and_then(|s| s.descriptor(table).cloned())
    }

    /// A copy of the current in-memory snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .state
            .lock()
            .snapshot()
            .cloned()
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.inner.file.path()
    }

    pub fn options(&self) -> StorageOptions {
        self.inner.options
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StorageState> {
        self.inner.state.lock()
    }

    /// Encode, compress and write the snapshot held by `state`.
    pub(crate) fn persist(&self, state: &mut StorageState) -> std::result::Result<(), StorageError> {
        let bytes = self.inner.codec.encode(state.snapshot_mut())?;
        let bytes = self.inner.options.compress.compress(bytes)?;
        self.inner.file.write(&bytes)?;
        debug!(path = %self.path().display(), bytes = bytes.len(), "saved database");
        Ok(())
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path())
            .field("options", &self.inner.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, SchemaDefinition};
    use crate::error::Error;
    use crate::types::{FieldType, Row, Value};
    use tempfile::tempdir;

    fn people() -> SchemaDefinition {
        [
            ("index".to_string(), FieldDef::primary_index()),
            ("name".to_string(), FieldDef::new(FieldType::String)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_options_from_config_document() {
        let options: StorageOptions =
            serde_json::from_value(serde_json::json!({"compress": true, "dropSchema": true})).unwrap();
        assert_eq!(options.compress, Compression::Deflate);
        assert!(options.drop_schema);

        let options: StorageOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(options, StorageOptions::default());
    }

    #[test]
    fn test_open_creates_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ldb");

        let storage = Storage::open(&path, StorageOptions::default()).unwrap();
        assert!(path.exists());
        assert!(storage.is_loaded());
        assert!(storage.table_names().is_empty());
        assert_eq!(storage.snapshot(), Snapshot::new());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ldb");

        {
            let storage = Storage::open(&path, StorageOptions::default()).unwrap();
            let mut state = storage.lock();
            let row: Row = [(0, Value::from("kept"))].into_iter().collect();
            state.snapshot_mut().rows_mut("t").insert(1, row);
            storage.persist(&mut state).unwrap();
        }

        let storage = Storage::open(&path, StorageOptions::default()).unwrap();
        let snapshot = storage.snapshot();
        assert_eq!(snapshot.rows("t").unwrap()[&1][&0], Value::from("kept"));
    }

    #[test]
    fn test_drop_schema_discards_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ldb");

        {
            let storage = Storage::open(&path, StorageOptions::default()).unwrap();
            Table::new("people", &people(), Some(&storage)).unwrap();
            assert_eq!(storage.table_names(), vec!["people".to_string()]);
        }

        let storage = Storage::open(&path, StorageOptions::new().with_drop_schema(true)).unwrap();
        assert!(storage.table_names().is_empty());
    }

    #[test]
    fn test_deflate_file_is_not_plain_messagepack() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ldb");

        let options = StorageOptions::new().with_compression(true);
        {
            let storage = Storage::open(&path, options).unwrap();
            Table::new("people", &people(), Some(&storage)).unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        assert!(MessagePackCodec.decode(&raw).is_err());

        let storage = Storage::open(&path, options).unwrap();
        assert_eq!(storage.table_names(), vec!["people".to_string()]);
    }

    #[test]
    fn test_wrong_compression_is_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ldb");

        Storage::open(&path, StorageOptions::default()).unwrap();
        let err = Storage::open(&path, StorageOptions::new().with_compression(Compression::Deflate))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::CorruptFile(_))));
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("t.ldb"), StorageOptions::default()).unwrap();
        let table = Table::new("people", &people(), None).unwrap();

        assert!(storage.create_table(&table));
        assert!(storage.create_table(&table));
        assert_eq!(storage.lock().live_tables().len(), 1);
    }

    #[test]
    fn test_init_persists_registered_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.ldb");
        let storage = Storage::open(&path, StorageOptions::default()).unwrap();

        let table = Table::new("people", &people(), None).unwrap();
        storage.create_table(&table);
        assert!(storage.descriptor("people").is_none());

        storage.init().unwrap();
        assert!(storage.descriptor("people").is_some());
        assert!(storage.snapshot().rows("people").is_some());
    }

    #[test]
    fn test_drop_table_removes_descriptor_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.ldb");
        let storage = Storage::open(&path, StorageOptions::default()).unwrap();

        let table = Table::new("people", &people(), Some(&storage)).unwrap();
        table.insert(serde_json::json!({"name": "Matheus"})).unwrap();
        storage.drop_table(&table).unwrap();

        assert!(storage.descriptor("people").is_none());
        assert!(storage.snapshot().rows("people").is_none());

        let reopened = Storage::open(&path, StorageOptions::default()).unwrap();
        assert!(reopened.table_names().is_empty());
    }

    #[test]
    fn test_load_reconciles_registered_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.ldb");
        let storage = Storage::open(&path, StorageOptions::default()).unwrap();
        let table = Table::new("people", &people(), Some(&storage)).unwrap();
        table.insert(serde_json::json!({"name": "a"})).unwrap();

        // Another handle writes more rows to the same file.
        {
            let other = Storage::open(&path, StorageOptions::default()).unwrap();
            let twin = Table::new("people", &people(), Some(&other)).unwrap();
            twin.insert(serde_json::json!({"name": "b"})).unwrap();
        }

        storage.load().unwrap();
        assert_eq!(table.all().unwrap().len(), 2);
        assert_eq!(table.schema()["index"].next_value, Some(3));
    }
}
