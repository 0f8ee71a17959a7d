use crate::catalog::types::{Row, RowId};
use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of one table.
///
/// `index` maps every id present in `rows` to its position and nothing else;
/// it is rebuilt wholesale whenever a new snapshot is produced rather than
/// patched per mutation. `last_id` is at least the largest id ever assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub index: BTreeMap<RowId, usize>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub last_id: RowId,
}

impl Snapshot {
    pub fn empty(last_id: RowId) -> Self {
        Self {
            last_id,
            ..Self::default()
        }
    }

    pub fn from_rows(rows: Vec<Row>, last_id: RowId) -> Self {
        let max_id = rows.iter().map(|r| r.id).max().unwrap_or(0);
        let mut snapshot = Self {
            index: BTreeMap::new(),
            rows,
            last_id: last_id.max(max_id),
        };
        snapshot.rebuild_index();
        snapshot
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.position(id).and_then(|pos| self.rows.get(pos))
    }

    pub fn rebuild_index(&mut self) {
        self.index = build_index(&self.rows);
    }

    /// Checks the index against the rows and `last_id` against the row ids.
    pub fn verify(&self) -> Result<(), TableError> {
        if self.index.len() != self.rows.len() {
            return Err(TableError::IntegrityError {
                message: format!(
                    "index holds {} ids for {} rows",
                    self.index.len(),
                    self.rows.len()
                ),
            });
        }
        for (pos, row) in self.rows.iter().enumerate() {
            if self.index.get(&row.id) != Some(&pos) {
                return Err(TableError::IntegrityError {
                    message: format!("row id {} is not indexed at position {pos}", row.id),
                });
            }
            if row.id > self.last_id {
                return Err(TableError::IntegrityError {
                    message: format!("row id {} exceeds last id {}", row.id, self.last_id),
                });
            }
        }
        Ok(())
    }

    /// Restores the invariants after a lenient load: duplicate ids keep
    /// their first occurrence, the index is rebuilt, `last_id` is raised to
    /// cover every row.
    pub fn repair(&mut self) {
        let mut seen = std::collections::BTreeSet::new();
        self.rows.retain(|row| seen.insert(row.id));
        if let Some(max_id) = self.rows.iter().map(|r| r.id).max() {
            self.last_id = self.last_id.max(max_id);
        }
        self.rebuild_index();
    }

    pub fn summary(&self) -> SaveSummary {
        SaveSummary {
            last_id: self.last_id,
            rows: self.rows.clone(),
        }
    }
}

pub fn build_index(rows: &[Row]) -> BTreeMap<RowId, usize> {
    rows.iter()
        .enumerate()
        .map(|(pos, row)| (row.id, pos))
        .collect()
}

/// What `save()` hands back: the committed rows and the last assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub last_id: RowId,
    pub rows: Vec<Row>,
}

pub fn encode_snapshot(snapshot: &Snapshot, pretty: bool) -> Result<Vec<u8>, TableError> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(snapshot)
    } else {
        serde_json::to_vec(snapshot)
    };
    encoded.map_err(|e| TableError::Encode(e.to_string()))
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, TableError> {
    serde_json::from_slice(bytes).map_err(|e| TableError::Decode(e.to_string()))
}
