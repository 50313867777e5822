//! Error types for the distributed object model.

use thiserror::Error;

use cindergrid_store::StoreError;

/// Result type alias for object model operations.
pub type ObjectResult<T> = Result<T, ObjectError>;

/// Errors that can occur during object model operations.
///
/// The object model never retries internally; the first failure is surfaced
/// and the caller decides whether to retry, move the entity to an error
/// state, or escalate.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid state change from {from:?} to {to} for {object_type} {uuid}")]
    InvalidTransition {
        object_type: String,
        uuid: String,
        from: Option<String>,
        to: String,
    },

    #[error("no state transitions defined for object type {0}")]
    NoTransitionsDefined(String),

    #[error("object not in an error state (state={state:?}, type={object_type})")]
    NotInErrorState {
        object_type: String,
        state: Option<String>,
    },

    #[error("unsupported schema version {version} for {object_type} {uuid}")]
    UnsupportedVersion {
        object_type: String,
        uuid: String,
        version: u32,
    },

    #[error("{object_type} {uuid} already exists")]
    DuplicateObject { object_type: String, uuid: String },

    #[error("malformed record: {0}")]
    Malformed(String),
}
