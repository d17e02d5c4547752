/// Errors from allocation verification and storage.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// The ledger has no transaction for this allocation ID, or the one it
    /// has describes an impossible allocation.
    #[error("invalid allocation {id}: {reason}")]
    InvalidAllocation { id: String, reason: String },

    /// The allocation transaction exists but its output does not decode.
    #[error("invalid allocation {id}: cannot decode transaction output: {reason}")]
    OutputDecode { id: String, reason: String },

    /// This node is not one of the allocation's participants.
    #[error("blobber {blobber_id} is not part of allocation {allocation_id}")]
    InvalidBlobber {
        allocation_id: String,
        blobber_id: String,
    },

    /// Persisting the verified allocation failed.
    #[error("failed to store allocation {id}: {reason}")]
    AllocationWrite { id: String, reason: String },

    /// The ledger could not be reached. Safe to retry.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// No local row exists for this allocation.
    #[error("allocation not found: {0}")]
    NotFound(String),

    /// The backing store refused writes.
    #[error("allocation store is read-only")]
    ReadOnly,

    /// The backing store failed internally (e.g. a poisoned lock).
    #[error("allocation store error: {0}")]
    Store(String),
}

/// Result alias for allocation operations.
pub type AllocationResult<T> = Result<T, AllocationError>;
