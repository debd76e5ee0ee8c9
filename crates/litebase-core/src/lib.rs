//! # LiteBase
//!
//! An embedded, single-file, schema-aware document store.
//!
//! A [`Storage`](storage::Storage) holds the whole database in memory and
//! rewrites its file on every mutation. [`Table`](api::Table)s declare a
//! schema, store rows keyed by stable field identities, and survive schema
//! changes: fields keep their identity across reopen, new fields get fresh
//! ones, and removed fields are purged from stored rows.
//!
//! ## Quick Start
//!
//! ```no_run
//! use litebase_core::api::{Query, Table};
//! use litebase_core::storage::StorageOptions;
//! use serde_json::json;
//!
//! // Create or open a database file
//! let storage = litebase_core::open("people.ldb", StorageOptions::default()).unwrap();
//!
//! // Declare a table; attaching persists its schema
//! let schema = serde_json::from_value(json!({
//!     "index": {"type": "index", "primary": true},
//!     "name": {"type": "string"},
//!     "age": {"type": "int", "null": false}
//! }))
//! .unwrap();
//! let people = Table::new("people", &schema, Some(&storage)).unwrap();
//!
//! // Insert and query
//! people.insert(json!({"name": "Alice", "age": 30})).unwrap();
//! let alice = people.find_one(Query::new().where_eq("name", "Alice")).unwrap();
//! assert_eq!(alice.unwrap()["age"], 30);
//! ```

pub mod api;
pub mod catalog;
pub mod encoding;
pub mod error;
pub mod storage;
pub mod types;

use std::path::Path;

pub use api::{Query, Table};
pub use error::{Error, Result};
pub use storage::{Storage, StorageOptions};

/// Open (or create) the database file at `path`.
pub fn open(path: impl AsRef<Path>, options: StorageOptions) -> Result<Storage> {
    Storage::open(path, options)
}
