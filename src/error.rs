use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Table,
    Column,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Table => write!(f, "table"),
            ResourceType::Column => write!(f, "column"),
        }
    }
}

/// Coarse classification used by callers deciding whether a failure is
/// their fault (configuration, usage, validation) or the environment's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Usage,
    Schema,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    DatabaseNameRequired,
    TableNameRequired,
    SchemaRequired,
    InvalidUsage,
    InvalidSchema,
    TypeMismatch,
    UnknownColumn,
    MissingColumn,
    RowLimitExceeded,
    Io,
    Encode,
    Decode,
    IntegrityError,
    TableNotFound,
    ColumnNotFound,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::DatabaseNameRequired => "database_name_required",
            ErrorCode::TableNameRequired => "table_name_required",
            ErrorCode::SchemaRequired => "schema_required",
            ErrorCode::InvalidUsage => "invalid_usage",
            ErrorCode::InvalidSchema => "invalid_schema",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::UnknownColumn => "unknown_column",
            ErrorCode::MissingColumn => "missing_column",
            ErrorCode::RowLimitExceeded => "row_limit_exceeded",
            ErrorCode::Io => "io",
            ErrorCode::Encode => "encode",
            ErrorCode::Decode => "decode",
            ErrorCode::IntegrityError => "integrity_error",
            ErrorCode::TableNotFound => "table_not_found",
            ErrorCode::ColumnNotFound => "column_not_found",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::InvalidConfig
            | ErrorCode::DatabaseNameRequired
            | ErrorCode::TableNameRequired
            | ErrorCode::SchemaRequired => ErrorKind::Configuration,
            ErrorCode::InvalidUsage => ErrorKind::Usage,
            ErrorCode::InvalidSchema => ErrorKind::Schema,
            ErrorCode::TypeMismatch
            | ErrorCode::UnknownColumn
            | ErrorCode::MissingColumn
            | ErrorCode::RowLimitExceeded => ErrorKind::Validation,
            ErrorCode::Io
            | ErrorCode::Encode
            | ErrorCode::Decode
            | ErrorCode::IntegrityError
            | ErrorCode::TableNotFound
            | ErrorCode::ColumnNotFound => ErrorKind::Storage,
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("database name is required")]
    DatabaseNameRequired,
    #[error("table name is required")]
    TableNameRequired,
    #[error("schema is required when defining table '{table}' for the first time")]
    SchemaRequired { table: String },
    #[error("invalid usage: {0}")]
    Usage(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("type mismatch: column '{column}' expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },
    #[error("missing value for required column '{column}'")]
    MissingColumn { column: String },
    #[error("table '{table}' would hold {rows} rows, limit is {limit}")]
    RowLimitExceeded {
        table: String,
        rows: usize,
        limit: usize,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("integrity error: {message}")]
    IntegrityError { message: String },
    #[error("{resource_type} '{resource_id}' not found")]
    NotFound {
        resource_type: ResourceType,
        resource_id: String,
    },
}

impl TableError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TableError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            TableError::DatabaseNameRequired => ErrorCode::DatabaseNameRequired,
            TableError::TableNameRequired => ErrorCode::TableNameRequired,
            TableError::SchemaRequired { .. } => ErrorCode::SchemaRequired,
            TableError::Usage(_) => ErrorCode::InvalidUsage,
            TableError::Schema(_) => ErrorCode::InvalidSchema,
            TableError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            TableError::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            TableError::MissingColumn { .. } => ErrorCode::MissingColumn,
            TableError::RowLimitExceeded { .. } => ErrorCode::RowLimitExceeded,
            TableError::Io(_) => ErrorCode::Io,
            TableError::Encode(_) => ErrorCode::Encode,
            TableError::Decode(_) => ErrorCode::Decode,
            TableError::IntegrityError { .. } => ErrorCode::IntegrityError,
            TableError::NotFound { resource_type, .. } => match resource_type {
                ResourceType::Table => ErrorCode::TableNotFound,
                ResourceType::Column => ErrorCode::ColumnNotFound,
            },
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}
