use crate::catalog::schema::{SchemaDefinition, parse};
use crate::catalog::types::{Document, Value};
use crate::error::{ResourceType, TableError};
use crate::snapshot::Snapshot;

/// An eager schema change. Unlike queued mutations it rewrites every stored
/// row and persists right away.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Add {
        name: String,
        column_type: String,
        default: Value,
    },
    Retype {
        name: String,
        column_type: String,
        default: Option<Value>,
    },
    Drop {
        names: Vec<String>,
    },
    Rename {
        from: String,
        to: String,
    },
}

impl ColumnChange {
    /// `default` is mandatory: existing rows have no value for the new
    /// column.
    pub fn add(
        name: impl Into<String>,
        column_type: impl Into<String>,
        default: Option<Value>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        let default = default.ok_or_else(|| {
            TableError::Usage(format!(
                "default value is mandatory when adding column '{name}'"
            ))
        })?;
        Ok(ColumnChange::Add {
            name,
            column_type: column_type.into(),
            default,
        })
    }

    pub fn retype(
        name: impl Into<String>,
        column_type: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        ColumnChange::Retype {
            name: name.into(),
            column_type: column_type.into(),
            default,
        }
    }

    pub fn drop<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnChange::Drop {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Result<Self, TableError> {
        let (from, to) = (from.into(), to.into());
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(TableError::Usage("invalid column name given".into()));
        }
        Ok(ColumnChange::Rename { from, to })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ColumnChange::Add { .. } => "add_column",
            ColumnChange::Retype { .. } => "update_column",
            ColumnChange::Drop { .. } => "drop_columns",
            ColumnChange::Rename { .. } => "rename_column",
        }
    }

    /// Computes the schema after this change, checking it against the current
    /// one. Any default value is validated against its new column type.
    pub fn plan(&self, current: &SchemaDefinition) -> Result<SchemaDefinition, TableError> {
        let mut next = current.clone();
        match self {
            ColumnChange::Add {
                name,
                column_type,
                default,
            } => {
                if current.contains_key(name) {
                    return Err(TableError::Usage(format!("column '{name}' already exists")));
                }
                next.insert(name.clone(), column_type.clone());
                check_default(&next, name, default)?;
            }
            ColumnChange::Retype {
                name,
                column_type,
                default,
            } => {
                if !current.contains_key(name) {
                    return Err(column_not_found(name));
                }
                next.insert(name.clone(), column_type.clone());
                if let Some(default) = default {
                    check_default(&next, name, default)?;
                } else {
                    parse(&next)?;
                }
            }
            ColumnChange::Drop { names } => {
                for name in names {
                    next.remove(name);
                }
            }
            ColumnChange::Rename { from, to } => {
                if from == to || current.contains_key(to) {
                    return Err(TableError::Usage(format!("column '{to}' already exists")));
                }
                let column_type = next.remove(from).ok_or_else(|| column_not_found(from))?;
                next.insert(to.clone(), column_type);
                parse(&next)?;
            }
        }
        Ok(next)
    }

    pub fn apply_to_row(&self, values: &mut Document) {
        match self {
            ColumnChange::Add { name, default, .. } => {
                values.insert(name.clone(), default.clone());
            }
            ColumnChange::Retype { name, default, .. } => {
                if let Some(default) = default {
                    values.insert(name.clone(), default.clone());
                }
            }
            ColumnChange::Drop { names } => {
                for name in names {
                    values.remove(name);
                }
            }
            ColumnChange::Rename { from, to } => {
                if let Some(value) = values.remove(from) {
                    values.insert(to.clone(), value);
                }
            }
        }
    }
}

fn column_not_found(name: &str) -> TableError {
    TableError::NotFound {
        resource_type: ResourceType::Column,
        resource_id: name.to_string(),
    }
}

fn check_default(
    schema: &SchemaDefinition,
    name: &str,
    default: &Value,
) -> Result<(), TableError> {
    let parsed = parse(schema)?;
    parsed.validate_value(name, default)
}

/// Rewrites every row under `change`. Ids, order and `last_id` are kept; the
/// index is rebuilt.
pub fn rewrite_rows(mut snapshot: Snapshot, change: &ColumnChange) -> Snapshot {
    for row in &mut snapshot.rows {
        change.apply_to_row(&mut row.values);
    }
    snapshot.rebuild_index();
    snapshot
}
