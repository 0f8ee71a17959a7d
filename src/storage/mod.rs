pub mod file;
pub mod memory;

use crate::error::TableError;
use crate::snapshot::Snapshot;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub use file::FileRowStore;
pub use memory::MemoryRowStore;

/// Loads and persists whole-table snapshots.
///
/// Implementations are blocking; the table layer runs them on tokio's
/// blocking pool. `save_table` must replace the stored snapshot atomically.
pub trait RowStore: Send + Sync + 'static {
    /// `Ok(None)` when the table has never been saved.
    fn load_table(&self, db_name: &str, table_name: &str) -> Result<Option<Snapshot>, TableError>;
    fn save_table(
        &self,
        db_name: &str,
        table_name: &str,
        snapshot: &Snapshot,
    ) -> Result<(), TableError>;
    fn table_exists(&self, db_name: &str, table_name: &str) -> Result<bool, TableError>;
    /// Returns whether anything was deleted.
    fn delete_table(&self, db_name: &str, table_name: &str) -> Result<bool, TableError>;
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8], fsync: bool) -> Result<(), TableError> {
    let dir = path.parent().ok_or_else(|| TableError::InvalidConfig {
        message: format!("path has no parent directory: {}", path.display()),
    })?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    if fsync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(path).map_err(|e| TableError::Io(e.error))?;
    if fsync {
        fsync_dir(dir)?;
    }
    Ok(())
}

fn fsync_dir(path: &Path) -> Result<(), TableError> {
    let dir = fs::File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_atomic;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces_and_creates_parents() {
        let dir = tempdir().expect("temp");
        let path = dir.path().join("nested").join("t.json");
        write_atomic(&path, b"one", true).expect("first write");
        write_atomic(&path, b"two", false).expect("second write");
        assert_eq!(std::fs::read(&path).expect("read"), b"two");
        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(leftovers, 1, "temp files must not linger");
    }
}
