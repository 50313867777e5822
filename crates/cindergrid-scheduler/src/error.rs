//! Error types for the scheduler.

use thiserror::Error;

use cindergrid_object::ObjectError;
use cindergrid_store::StoreError;

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur during placement.
///
/// Placement failures are caller-visible; the requester typically moves the
/// workload to an error state and tears it down rather than requeueing.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("candidate node not found: {0}")]
    CandidateNotFound(String),

    #[error("low resources: {0}")]
    LowResource(String),

    /// Raised by callers when a chosen node later rejects the workload;
    /// they may retry placement with different explicit candidates.
    #[error("node rejected workload start: {0}")]
    AbortStart(String),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
