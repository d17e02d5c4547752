//! Foundation types for the blobber core.
//!
//! Every other blobber crate depends on `blobber-types`. It provides the
//! small vocabulary shared across allocation verification, the reference
//! tree, the write-marker chain, and proof construction.
//!
//! # Key Types
//!
//! - [`Digest`]: 32-byte hash with a canonical lowercase hex form
//! - [`AllocationPath`]: validated absolute path inside an allocation
//! - [`Timestamp`]: ledger-style seconds since the UNIX epoch

pub mod digest;
pub mod error;
pub mod path;
pub mod time;

pub use digest::{Digest, EMPTY_ROOT};
pub use error::TypeError;
pub use path::{AllocationPath, MAX_PATH_DEPTH};
pub use time::{from_unix_nanos, now_seconds, to_unix_nanos, Timestamp};
