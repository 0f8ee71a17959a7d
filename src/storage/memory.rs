use super::RowStore;
use crate::error::TableError;
use crate::snapshot::{Snapshot, decode_snapshot, encode_snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Keeps encoded snapshots in memory, so loads go through the same decode
/// path as the file store and callers can compare stored bytes.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    tables: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_bytes(&self, db_name: &str, table_name: &str) -> Option<Vec<u8>> {
        self.tables
            .lock()
            .get(&(db_name.to_string(), table_name.to_string()))
            .cloned()
    }
}

impl RowStore for MemoryRowStore {
    fn load_table(&self, db_name: &str, table_name: &str) -> Result<Option<Snapshot>, TableError> {
        let bytes = self.raw_bytes(db_name, table_name);
        bytes.map(|b| decode_snapshot(&b)).transpose()
    }

    fn save_table(
        &self,
        db_name: &str,
        table_name: &str,
        snapshot: &Snapshot,
    ) -> Result<(), TableError> {
        let bytes = encode_snapshot(snapshot, false)?;
        self.tables
            .lock()
            .insert((db_name.to_string(), table_name.to_string()), bytes);
        Ok(())
    }

    fn table_exists(&self, db_name: &str, table_name: &str) -> Result<bool, TableError> {
        Ok(self
            .tables
            .lock()
            .contains_key(&(db_name.to_string(), table_name.to_string())))
    }

    fn delete_table(&self, db_name: &str, table_name: &str) -> Result<bool, TableError> {
        Ok(self
            .tables
            .lock()
            .remove(&(db_name.to_string(), table_name.to_string()))
            .is_some())
    }
}
