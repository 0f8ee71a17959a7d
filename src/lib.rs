pub mod catalog;
pub mod commit;
pub mod config;
pub mod error;
pub mod migration;
pub mod query;
pub mod snapshot;
pub mod storage;
pub mod table;

pub use crate::catalog::schema::{ColumnType, ParsedSchema, SchemaDefinition, definition};
pub use crate::catalog::types::{Document, Row, RowId, Value, document};
pub use crate::commit::{Batch, Target};
pub use crate::config::StoreConfig;
pub use crate::error::{ErrorKind, TableError};
pub use crate::snapshot::{SaveSummary, Snapshot};
pub use crate::table::{HandleState, Table};

use crate::catalog::{CATALOG_FILE, Catalog, TableConfig};
use crate::config::{StorageMode, validate_config, validate_name};
use crate::storage::{FileRowStore, MemoryRowStore, RowStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One named database: its catalog, its row store, and the write locks that
/// serialise saves and column migrations per table.
///
/// Cloning is cheap and clones share locks, so every handle opened through
/// any clone of the same `Database` is serialised against the others.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    config: StoreConfig,
    catalog: Catalog,
    row_store: Arc<dyn RowStore>,
    table_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("storage_mode", &self.inner.config.storage_mode)
            .field("root", &self.inner.config.root)
            .finish()
    }
}

impl Database {
    pub fn open(config: StoreConfig, db_name: &str) -> Result<Self, TableError> {
        let row_store: Arc<dyn RowStore> = match config.storage_mode {
            StorageMode::File => Arc::new(
                FileRowStore::new(config.root.clone())
                    .with_fsync(config.fsync())
                    .with_pretty_json(config.pretty_json),
            ),
            StorageMode::Memory => Arc::new(MemoryRowStore::new()),
        };
        Self::open_with_row_store(config, db_name, row_store)
    }

    /// Opens a database whose rows live in `row_store`. The catalog still
    /// follows `config.storage_mode`.
    pub fn open_with_row_store(
        config: StoreConfig,
        db_name: &str,
        row_store: Arc<dyn RowStore>,
    ) -> Result<Self, TableError> {
        validate_name(db_name, TableError::DatabaseNameRequired)?;
        validate_config(&config)?;
        let catalog = match config.storage_mode {
            StorageMode::File => {
                let path = config.root.join(db_name).join(CATALOG_FILE);
                Catalog::open(&path, config.fsync(), config.pretty_json)?
            }
            StorageMode::Memory => Catalog::in_memory(),
        };
        info!(
            db = db_name,
            storage_mode = ?config.storage_mode,
            durability_mode = ?config.durability_mode,
            recovery_mode = ?config.recovery_mode,
            root = %config.root.display(),
            tables = catalog.table_names().len(),
            "database opened"
        );
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                name: db_name.to_string(),
                config,
                catalog,
                row_store,
                table_locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn row_store(&self) -> &Arc<dyn RowStore> {
        &self.inner.row_store
    }

    pub fn table_names(&self) -> Vec<String> {
        self.inner.catalog.table_names()
    }

    /// Opens a handle on `table_name`. `schema` is required when the table
    /// is not in the catalog yet; for an existing table the stored schema
    /// wins.
    pub fn table(
        &self,
        table_name: &str,
        schema: Option<SchemaDefinition>,
    ) -> Result<Table, TableError> {
        Table::open(self.clone(), table_name, schema)
    }

    /// Removes the table from the catalog and deletes its stored rows.
    /// Returns whether anything existed.
    pub async fn drop_table(&self, table_name: &str) -> Result<bool, TableError> {
        validate_name(table_name, TableError::TableNameRequired)?;
        let lock = self.table_lock(table_name);
        let _guard = lock.lock().await;
        let inner = Arc::clone(&self.inner);
        let table = table_name.to_string();
        let (in_catalog, had_rows) = run_blocking(move || {
            let in_catalog = inner.catalog.drop_table(&table)?;
            let had_rows = inner.row_store.delete_table(&inner.name, &table)?;
            Ok((in_catalog, had_rows))
        })
        .await?;
        self.inner.table_locks.lock().remove(table_name);
        info!(
            db = %self.inner.name,
            table = table_name,
            in_catalog,
            had_rows,
            "table dropped"
        );
        Ok(in_catalog || had_rows)
    }

    pub(crate) fn table_lock(&self, table_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.table_locks.lock();
        Arc::clone(locks.entry(table_name.to_string()).or_default())
    }

    /// Catalog writes fsync under `DurabilityMode::Full`, so they go to the
    /// blocking pool like row store I/O.
    pub(crate) async fn update_catalog(
        &self,
        table_name: &str,
        schema: SchemaDefinition,
        last_id: RowId,
    ) -> Result<TableConfig, TableError> {
        let inner = Arc::clone(&self.inner);
        let table = table_name.to_string();
        run_blocking(move || inner.catalog.update_table(&table, schema, last_id)).await
    }

    pub(crate) fn read_table_config(&self, table_name: &str) -> Result<TableConfig, TableError> {
        self.inner
            .catalog
            .read_table(table_name)
            .ok_or_else(|| TableError::NotFound {
                resource_type: error::ResourceType::Table,
                resource_id: format!("{}.{table_name}", self.inner.name),
            })
    }

    /// Loads the stored snapshot, or an empty one if the table was never
    /// saved. `last_id` is raised to the catalog's value so ids keep
    /// increasing even if the file lags behind the catalog.
    pub(crate) async fn load_snapshot(
        &self,
        table_name: &str,
        catalog_last_id: RowId,
    ) -> Result<Snapshot, TableError> {
        let store = Arc::clone(&self.inner.row_store);
        let (db, table) = (self.inner.name.clone(), table_name.to_string());
        let loaded = run_blocking(move || store.load_table(&db, &table)).await?;
        let mut snapshot = match loaded {
            Some(snapshot) => snapshot,
            None => {
                debug!(table = table_name, "no stored rows, starting empty");
                Snapshot::empty(catalog_last_id)
            }
        };
        snapshot.last_id = snapshot.last_id.max(catalog_last_id);
        if let Err(err) = snapshot.verify() {
            if self.inner.config.strict_recovery() {
                return Err(err);
            }
            warn!(
                table = table_name,
                error = %err,
                "stored snapshot inconsistent, rebuilding index"
            );
            snapshot.repair();
        }
        Ok(snapshot)
    }

    pub(crate) async fn persist_snapshot(
        &self,
        table_name: &str,
        snapshot: Snapshot,
    ) -> Result<Snapshot, TableError> {
        let store = Arc::clone(&self.inner.row_store);
        let (db, table) = (self.inner.name.clone(), table_name.to_string());
        run_blocking(move || {
            store.save_table(&db, &table, &snapshot)?;
            Ok(snapshot)
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, TableError>
where
    F: FnOnce() -> Result<T, TableError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TableError::Io(std::io::Error::other(e.to_string())))?
}
