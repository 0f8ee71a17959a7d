use super::{RowStore, write_atomic};
use crate::error::TableError;
use crate::snapshot::{Snapshot, decode_snapshot, encode_snapshot};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TABLES_DIR: &str = "tables";

/// Stores each table as `<root>/<db>/tables/<table>.json`.
#[derive(Debug, Clone)]
pub struct FileRowStore {
    root: PathBuf,
    fsync: bool,
    pretty_json: bool,
}

impl FileRowStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fsync: true,
            pretty_json: false,
        }
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, db_name: &str, table_name: &str) -> PathBuf {
        self.root
            .join(db_name)
            .join(TABLES_DIR)
            .join(format!("{table_name}.json"))
    }
}

impl RowStore for FileRowStore {
    fn load_table(&self, db_name: &str, table_name: &str) -> Result<Option<Snapshot>, TableError> {
        let path = self.table_path(db_name, table_name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), bytes = bytes.len(), "load table file");
        decode_snapshot(&bytes).map(Some)
    }

    fn save_table(
        &self,
        db_name: &str,
        table_name: &str,
        snapshot: &Snapshot,
    ) -> Result<(), TableError> {
        let path = self.table_path(db_name, table_name);
        let bytes = encode_snapshot(snapshot, self.pretty_json)?;
        write_atomic(&path, &bytes, self.fsync)
    }

    fn table_exists(&self, db_name: &str, table_name: &str) -> Result<bool, TableError> {
        Ok(self.table_path(db_name, table_name).is_file())
    }

    fn delete_table(&self, db_name: &str, table_name: &str) -> Result<bool, TableError> {
        match fs::remove_file(self.table_path(db_name, table_name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FileRowStore;
    use crate::catalog::types::{Row, document};
    use crate::error::ErrorCode;
    use crate::snapshot::Snapshot;
    use crate::storage::RowStore;
    use tempfile::tempdir;

    #[test]
    fn save_load_delete_cycle() {
        let dir = tempdir().expect("temp");
        let store = FileRowStore::new(dir.path()).with_fsync(false);
        assert!(store.load_table("db", "t").expect("load missing").is_none());
        assert!(!store.table_exists("db", "t").expect("exists"));

        let snapshot = Snapshot::from_rows(vec![Row::new(1, document([("foo", "a")]))], 1);
        store.save_table("db", "t", &snapshot).expect("save");
        assert!(store.table_exists("db", "t").expect("exists"));
        assert_eq!(store.load_table("db", "t").expect("load"), Some(snapshot));

        assert!(store.delete_table("db", "t").expect("delete"));
        assert!(!store.delete_table("db", "t").expect("delete again"));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempdir().expect("temp");
        let store = FileRowStore::new(dir.path());
        let path = store.table_path("db", "t");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, b"{broken").expect("write");
        let err = store.load_table("db", "t").expect_err("corrupt");
        assert_eq!(err.code(), ErrorCode::Decode);
    }
}
