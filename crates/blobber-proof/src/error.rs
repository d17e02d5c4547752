use blobber_reference::RefError;

/// Errors from proof construction and verification.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    /// The block number is outside `1..=available`.
    #[error("invalid block number {block_num}: {available} blocks available")]
    InvalidBlockNum { block_num: i64, available: i64 },

    /// A proof failed to recompute to its stated root.
    #[error("proof does not verify at {path}: {reason}")]
    Verification { path: String, reason: String },

    /// The structure was cut at the recursion limit and cannot be checked.
    #[error("proof truncated at depth {0}")]
    Truncated(usize),

    #[error(transparent)]
    Reference(#[from] RefError),
}

/// Convenience alias for proof results.
pub type ProofResult<T> = Result<T, ProofError>;
