//! Error types for the CinderGrid substrate.

use thiserror::Error;

/// Result type alias for substrate operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during substrate operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("lock error: {0}")]
    Lock(String),
}
