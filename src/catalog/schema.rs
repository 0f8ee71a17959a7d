use crate::catalog::types::{Document, ROW_ID_FIELD, Value};
use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column name to type descriptor, e.g. `{"name": "String", "age": "Integer?"}`.
pub type SchemaDefinition = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl ColumnType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "String" => Some(ColumnType::String),
            "Number" => Some(ColumnType::Number),
            "Integer" => Some(ColumnType::Integer),
            "Boolean" => Some(ColumnType::Boolean),
            "Array" => Some(ColumnType::Array),
            "Object" => Some(ColumnType::Object),
            "Any" => Some(ColumnType::Any),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Number => "Number",
            ColumnType::Integer => "Integer",
            ColumnType::Boolean => "Boolean",
            ColumnType::Array => "Array",
            ColumnType::Object => "Object",
            ColumnType::Any => "Any",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ColumnType::Any, _) => true,
            (ColumnType::String, Value::Text(_)) => true,
            (ColumnType::Number, Value::Integer(_) | Value::Float(_)) => true,
            (ColumnType::Integer, Value::Integer(_)) => true,
            (ColumnType::Boolean, Value::Boolean(_)) => true,
            (ColumnType::Array, Value::List(_)) => true,
            (ColumnType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub column_type: ColumnType,
    pub optional: bool,
}

impl ColumnSpec {
    pub fn parse(descriptor: &str) -> Result<Self, TableError> {
        let trimmed = descriptor.trim();
        let (name, optional) = match trimmed.strip_suffix('?') {
            Some(base) => (base.trim_end(), true),
            None => (trimmed, false),
        };
        let column_type = ColumnType::parse(name)
            .ok_or_else(|| TableError::Schema(format!("unrecognized column type '{descriptor}'")))?;
        Ok(Self {
            column_type,
            optional,
        })
    }

    pub fn descriptor(&self) -> String {
        if self.optional {
            format!("{}?", self.column_type.as_str())
        } else {
            self.column_type.as_str().to_string()
        }
    }

    fn check(&self, column: &str, value: Option<&Value>) -> Result<(), TableError> {
        match value {
            None | Some(Value::Null) if self.optional => Ok(()),
            None => Err(TableError::MissingColumn {
                column: column.to_string(),
            }),
            Some(v) if !v.is_storable() => Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: self.descriptor(),
                actual: "non-finite float".to_string(),
            }),
            Some(v) if self.column_type.accepts(v) => Ok(()),
            Some(v) => Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: self.descriptor(),
                actual: v.kind_name().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSchema {
    columns: BTreeMap<String, ColumnSpec>,
}

impl ParsedSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnSpec)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn validate_value(&self, column: &str, value: &Value) -> Result<(), TableError> {
        let spec = self
            .columns
            .get(column)
            .ok_or_else(|| TableError::UnknownColumn {
                column: column.to_string(),
            })?;
        spec.check(column, Some(value))
    }

    pub fn validate_document(&self, doc: &Document) -> Result<(), TableError> {
        if let Some(column) = doc.keys().find(|k| !self.columns.contains_key(*k)) {
            return Err(TableError::UnknownColumn {
                column: column.clone(),
            });
        }
        for (column, spec) in &self.columns {
            spec.check(column, doc.get(column))?;
        }
        Ok(())
    }
}

pub fn parse(definition: &SchemaDefinition) -> Result<ParsedSchema, TableError> {
    let mut columns = BTreeMap::new();
    for (name, descriptor) in definition {
        if name.trim().is_empty() {
            return Err(TableError::Schema("column name must not be empty".into()));
        }
        if name == ROW_ID_FIELD {
            return Err(TableError::Schema(format!(
                "column name '{ROW_ID_FIELD}' is reserved"
            )));
        }
        columns.insert(name.clone(), ColumnSpec::parse(descriptor)?);
    }
    Ok(ParsedSchema { columns })
}

pub fn validate(schema: &ParsedSchema, rows: &[Document]) -> Result<(), TableError> {
    rows.iter().try_for_each(|row| schema.validate_document(row))
}

/// Builds a [`SchemaDefinition`] from `(column, descriptor)` pairs.
pub fn definition<K, V, I>(pairs: I) -> SchemaDefinition
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
