use crate::error::TableError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// One JSON file per table plus a catalog file under `root/<db>/`.
    File,
    /// Everything lives in process memory; `root` is ignored.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync the written file and its directory before reporting success.
    Full,
    /// Rely on the atomic rename only; the OS decides when data hits disk.
    OsBuffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    Strict,
    Permissive,
}

/// Runtime configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub storage_mode: StorageMode,
    pub durability_mode: DurabilityMode,
    /// Strict recovery rejects a stored snapshot whose index disagrees with
    /// its rows; permissive recovery rebuilds the index and logs a warning.
    pub recovery_mode: RecoveryMode,
    pub pretty_json: bool,
    /// Upper bound on rows per table after a save. Zero disables the check.
    pub max_rows_per_table: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            storage_mode: StorageMode::File,
            durability_mode: DurabilityMode::Full,
            recovery_mode: RecoveryMode::Strict,
            pretty_json: false,
            max_rows_per_table: 0,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            storage_mode: StorageMode::Memory,
            durability_mode: DurabilityMode::OsBuffered,
            ..Self::default()
        }
    }

    pub fn development(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability_mode: DurabilityMode::OsBuffered,
            recovery_mode: RecoveryMode::Permissive,
            pretty_json: true,
            ..Self::default()
        }
    }

    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability_mode = mode;
        self
    }

    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn with_max_rows_per_table(mut self, limit: usize) -> Self {
        self.max_rows_per_table = limit;
        self
    }

    pub fn strict_recovery(&self) -> bool {
        matches!(self.recovery_mode, RecoveryMode::Strict)
    }

    pub fn fsync(&self) -> bool {
        matches!(self.durability_mode, DurabilityMode::Full)
    }
}

pub fn validate_config(config: &StoreConfig) -> Result<(), TableError> {
    if config.storage_mode == StorageMode::File && config.root.as_os_str().is_empty() {
        return Err(TableError::InvalidConfig {
            message: "root directory is required for file storage".into(),
        });
    }
    if config.storage_mode == StorageMode::File && config.root.is_file() {
        return Err(TableError::InvalidConfig {
            message: format!("root is not a directory: {}", config.root.display()),
        });
    }
    Ok(())
}

/// Database and table names end up as path components, so they are held to
/// a conservative character set.
pub(crate) fn validate_name(name: &str, missing: TableError) -> Result<(), TableError> {
    if name.trim().is_empty() {
        return Err(missing);
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.starts_with('.');
    if !valid {
        return Err(TableError::InvalidConfig {
            message: format!("invalid name '{name}'"),
        });
    }
    Ok(())
}
