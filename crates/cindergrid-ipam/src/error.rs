//! Error types for the IP address manager.

use thiserror::Error;

use cindergrid_object::ObjectError;
use cindergrid_store::StoreError;

/// Result type alias for IPAM operations.
pub type IpamResult<T> = Result<T, IpamError>;

/// Errors that can occur during address management.
#[derive(Debug, Error)]
pub enum IpamError {
    /// Allocation exhausted the block even after aggressive halo
    /// reclamation.
    #[error("no free addresses on network {0}")]
    CongestedNetwork(String),

    #[error("invalid address block: {0}")]
    InvalidBlock(String),

    #[error("address {0} is not in this block")]
    OutOfRange(String),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
