use thiserror::Error;

/// Main error type for the Flatrest engine
#[derive(Debug, Error)]
pub enum FlatrestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised while resolving a query against table rows
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Expected exactly {expected} row, got {found}")]
    RowCount { expected: usize, found: usize },

    #[error("Duplicate id: {0}")]
    Conflict(String),
}

/// Storage-layer errors. Read failures never surface here; they degrade to an empty table.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid table name: '{0}'")]
    InvalidTableName(String),

    #[error("Failed to write table '{table}': {reason}")]
    WriteFailed { table: String, reason: String },

    #[error("Failed to serialize table '{table}': {reason}")]
    Serialization { table: String, reason: String },

    #[error("Data directory unavailable: {0}")]
    DataDirUnavailable(String),
}

/// Result type alias for Flatrest operations
pub type FlatrestResult<T> = Result<T, FlatrestError>;
