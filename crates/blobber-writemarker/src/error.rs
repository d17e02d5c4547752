use blobber_allocation::AllocationError;
use blobber_reference::RefError;

/// Errors produced by write-marker operations.
#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    /// The marker does not build on the allocation's current root.
    #[error("stale root: allocation is at {current}, marker builds on {previous}")]
    StaleRoot { current: String, previous: String },

    /// The marker is older than the last committed marker.
    #[error("out of order: last committed marker at {last}, got {timestamp}")]
    OutOfOrder { last: i64, timestamp: i64 },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The marker names another allocation or blobber, or does not match
    /// the marker proposed in the same scope.
    #[error("invalid write marker: {0}")]
    InvalidMarker(String),

    /// The tree after applying the mutation does not hash to the signed root.
    #[error("root mismatch: marker signs {expected}, tree computes {computed}")]
    RootMismatch { expected: String, computed: String },

    /// The marker's size does not match the tree's size change.
    #[error("size mismatch: marker declares {declared}, tree changed by {actual}")]
    SizeMismatch { declared: i64, actual: i64 },

    /// Committing would push this node's usage past its share.
    #[error("quota exceeded for {allocation_id}: {used} + {delta} > {share}")]
    QuotaExceeded {
        allocation_id: String,
        used: i64,
        delta: i64,
        share: i64,
    },

    /// No committed marker with the given allocation root.
    #[error("write marker not found: {0}")]
    NotFound(String),

    /// The stored chain does not accept the entry.
    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Reference(#[from] RefError),

    #[error("marker store error: {0}")]
    Store(String),
}

/// Result alias for write-marker operations.
pub type MarkerResult<T> = Result<T, MarkerError>;
