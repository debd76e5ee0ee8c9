use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::TableDescriptor;
use crate::types::TableData;

/// The complete durable state of a database file: every table's descriptor
/// and every table's rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: BTreeMap<String, TableDescriptor>,
    pub data: BTreeMap<String, TableData>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(&self, table: &str) -> Option<&TableDescriptor> {
        self.tables.get(table)
    }

    pub fn rows(&self, table: &str) -> Option<&TableData> {
        self.data.get(table)
    }

    /// Rows of `table`, creating an empty container if needed.
    pub fn rows_mut(&mut self, table: &str) -> &mut TableData {
        self.data.entry(table.to_string()).or_default()
    }

    /// Remove both the descriptor and the rows of `table`.
    pub fn remove_table(&mut self, table: &str) -> bool {
        let had_descriptor = self.tables.remove(table).is_some();
        let had_rows = self.data.remove(table).is_some();
        had_descriptor || had_rows
    }
}
