use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Store unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
    #[error("Schema mismatch: declared {declared:?}, found {found:?}")]
    SchemaMismatch {
        declared: Vec<String>,
        found: Vec<String>,
    },
    #[error("Cannot open version {requested}: database is already at version {current}")]
    VersionDowngrade { requested: u32, current: u32 },
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if deleting the database and reopening may clear the error.
    ///
    /// Includes `VersionDowngrade`: a file written by a newer build is discarded.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_) | StoreError::VersionDowngrade { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
