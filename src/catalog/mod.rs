pub mod schema;
pub mod types;

use crate::catalog::schema::SchemaDefinition;
use crate::catalog::types::RowId;
use crate::error::{ResourceType, TableError};
use crate::storage::write_atomic;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CATALOG_FILE: &str = "catalog.json";

/// Per-table metadata kept by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub schema: SchemaDefinition,
    pub last_id: RowId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogData {
    pub tables: BTreeMap<String, TableConfig>,
}

/// Schema and last assigned id for every table of one database.
///
/// Each change is applied to a copy, persisted, and only then published, so
/// a failed write leaves the in-memory view untouched. Writers serialise on
/// `writer`; readers only wait for the final swap, never for the file write.
#[derive(Debug)]
pub struct Catalog {
    path: Option<PathBuf>,
    fsync: bool,
    pretty_json: bool,
    writer: Mutex<()>,
    data: RwLock<CatalogData>,
}

impl Catalog {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            fsync: false,
            pretty_json: false,
            writer: Mutex::new(()),
            data: RwLock::new(CatalogData::default()),
        }
    }

    pub fn open(path: &Path, fsync: bool, pretty_json: bool) -> Result<Self, TableError> {
        let data = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<CatalogData>(&bytes)
                .map_err(|e| TableError::Decode(format!("{}: {e}", path.display())))?,
            Err(err) if err.kind() == ErrorKind::NotFound => CatalogData::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), tables = data.tables.len(), "catalog loaded");
        Ok(Self {
            path: Some(path.to_path_buf()),
            fsync,
            pretty_json,
            writer: Mutex::new(()),
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.data.read().tables.contains_key(table_name)
    }

    pub fn read_table(&self, table_name: &str) -> Option<TableConfig> {
        self.data.read().tables.get(table_name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.data.read().tables.keys().cloned().collect()
    }

    /// Registers a table with `last_id = 0`. An existing entry is returned
    /// unchanged.
    pub fn create_table(
        &self,
        table_name: &str,
        schema: SchemaDefinition,
    ) -> Result<TableConfig, TableError> {
        let _writer = self.writer.lock();
        let mut next = self.data.read().clone();
        if let Some(existing) = next.tables.get(table_name) {
            return Ok(existing.clone());
        }
        let config = TableConfig { schema, last_id: 0 };
        next.tables.insert(table_name.to_string(), config.clone());
        self.publish(next)?;
        info!(table = table_name, "catalog table created");
        Ok(config)
    }

    /// Replaces the schema and advances `last_id`. The stored id never moves
    /// backwards.
    pub fn update_table(
        &self,
        table_name: &str,
        schema: SchemaDefinition,
        last_id: RowId,
    ) -> Result<TableConfig, TableError> {
        let _writer = self.writer.lock();
        let current = self.data.read().clone();
        let mut next = current.clone();
        let entry = next
            .tables
            .get_mut(table_name)
            .ok_or_else(|| TableError::NotFound {
                resource_type: ResourceType::Table,
                resource_id: table_name.to_string(),
            })?;
        entry.schema = schema;
        entry.last_id = entry.last_id.max(last_id);
        let updated = entry.clone();
        if next != current {
            self.publish(next)?;
        }
        Ok(updated)
    }

    pub fn drop_table(&self, table_name: &str) -> Result<bool, TableError> {
        let _writer = self.writer.lock();
        let mut next = self.data.read().clone();
        if next.tables.remove(table_name).is_none() {
            return Ok(false);
        }
        self.publish(next)?;
        info!(table = table_name, "catalog table dropped");
        Ok(true)
    }

    /// Writes `next` to disk, then makes it visible. Caller holds `writer`.
    fn publish(&self, next: CatalogData) -> Result<(), TableError> {
        if let Some(path) = &self.path {
            let bytes = if self.pretty_json {
                serde_json::to_vec_pretty(&next)
            } else {
                serde_json::to_vec(&next)
            }
            .map_err(|e| TableError::Encode(e.to_string()))?;
            write_atomic(path, &bytes, self.fsync)?;
        }
        *self.data.write() = next;
        Ok(())
    }
}
