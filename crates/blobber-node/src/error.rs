use std::fmt;

use blobber_allocation::AllocationError;
use blobber_proof::ProofError;
use blobber_protocol::ProtocolError;
use blobber_reference::RefError;
use blobber_types::TypeError;
use blobber_writemarker::MarkerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Reference(#[from] RefError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Path(#[from] TypeError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Content offered for a storage challenge does not match the file.
    #[error("challenge failed for {path}: {reason}")]
    ChallengeFailed { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Stable classification of every failure the node can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAllocation,
    InvalidBlobber,
    AllocationWriteError,
    LedgerUnavailable,
    StaleRoot,
    OutOfOrder,
    InvalidSignature,
    InvalidMarker,
    RootMismatch,
    SizeMismatch,
    QuotaExceeded,
    NotFound,
    InvalidPath,
    InvalidRequest,
    Unauthorized,
    ChallengeFailed,
    Protocol,
    Config,
    Internal,
}

impl ErrorKind {
    /// Only a ledger outage is worth retrying unchanged; every other kind
    /// fails the same way on the next attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::LedgerUnavailable)
    }

    /// Status code carried in `BlobberMessage::Error`.
    pub fn code(self) -> u32 {
        match self {
            Self::InvalidPath | Self::InvalidRequest | Self::InvalidMarker | Self::Protocol => 400,
            Self::InvalidSignature | Self::Unauthorized => 401,
            Self::InvalidBlobber => 403,
            Self::InvalidAllocation | Self::NotFound => 404,
            Self::StaleRoot | Self::OutOfOrder => 409,
            Self::RootMismatch | Self::SizeMismatch | Self::ChallengeFailed => 422,
            Self::QuotaExceeded => 507,
            Self::LedgerUnavailable => 503,
            Self::AllocationWriteError | Self::Config | Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Allocation(e) => allocation_kind(e),
            Self::Reference(e) => ref_kind(e),
            Self::Marker(e) => marker_kind(e),
            Self::Proof(e) => match e {
                ProofError::InvalidBlockNum { .. } => ErrorKind::InvalidRequest,
                ProofError::Verification { .. } => ErrorKind::RootMismatch,
                // Only verification reports truncation; construction flags it.
                ProofError::Truncated(_) => ErrorKind::InvalidRequest,
                ProofError::Reference(e) => ref_kind(e),
            },
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Path(_) => ErrorKind::InvalidPath,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ChallengeFailed { .. } => ErrorKind::ChallengeFailed,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

fn allocation_kind(e: &AllocationError) -> ErrorKind {
    match e {
        AllocationError::InvalidAllocation { .. } | AllocationError::OutputDecode { .. } => {
            ErrorKind::InvalidAllocation
        }
        AllocationError::InvalidBlobber { .. } => ErrorKind::InvalidBlobber,
        AllocationError::AllocationWrite { .. } => ErrorKind::AllocationWriteError,
        AllocationError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
        AllocationError::NotFound(_) => ErrorKind::NotFound,
        AllocationError::ReadOnly | AllocationError::Store(_) => ErrorKind::Internal,
    }
}

fn ref_kind(e: &RefError) -> ErrorKind {
    match e {
        RefError::NotFound(_) => ErrorKind::NotFound,
        RefError::InvalidPath { .. } => ErrorKind::InvalidPath,
        RefError::Store(_) => ErrorKind::Internal,
    }
}

fn marker_kind(e: &MarkerError) -> ErrorKind {
    match e {
        MarkerError::StaleRoot { .. } => ErrorKind::StaleRoot,
        MarkerError::OutOfOrder { .. } => ErrorKind::OutOfOrder,
        MarkerError::InvalidSignature(_) => ErrorKind::InvalidSignature,
        MarkerError::InvalidMarker(_) => ErrorKind::InvalidMarker,
        MarkerError::RootMismatch { .. } => ErrorKind::RootMismatch,
        MarkerError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
        MarkerError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
        MarkerError::NotFound(_) => ErrorKind::NotFound,
        MarkerError::Allocation(e) => allocation_kind(e),
        MarkerError::Reference(e) => ref_kind(e),
        MarkerError::IntegrityViolation { .. } | MarkerError::Store(_) => ErrorKind::Internal,
    }
}
