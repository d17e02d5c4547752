use blobber_types::TypeError;

/// Errors from reference tree operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// No node exists at the given path or lookup hash.
    #[error("reference not found: {0}")]
    NotFound(String),

    /// The path is malformed or conflicts with the existing tree shape
    /// (a file where a directory is needed, or the reverse).
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Internal store failure (e.g. lock poisoned).
    #[error("reference store error: {0}")]
    Store(String),
}

impl From<TypeError> for RefError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidPath { path, reason } => RefError::InvalidPath { path, reason },
            other => RefError::InvalidPath {
                path: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience result type for reference operations.
pub type Result<T> = std::result::Result<T, RefError>;
