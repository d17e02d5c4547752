//! Storage node facade for the blobber core.
//!
//! [`StorageNode`] wires the allocation registry, reference trees, the
//! write-marker ledger, and the proof builder together behind one API, and
//! answers protocol requests with [`StorageNode::handle`]. Node identity
//! comes from [`NodeConfig`]; nothing is read from process globals.
//!
//! ```text
//! request ──► AllocationRegistry ──► verified Allocation
//!                                      │
//!              writes ◄────────────────┤────────────────► reads / audits
//!   WriteMarkerLedger (scope, commit)  │   RefTree snapshot, PathProofBuilder
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod node;
pub mod telemetry;

pub use auth::{authorize_owner, owner_challenge, sign_as_owner};
pub use config::NodeConfig;
pub use error::{ErrorKind, NodeError, NodeResult};
pub use node::{ChallengeProof, FileMetaView, NodeBackends, StorageNode};
pub use telemetry::init_tracing;

// Re-export key types
pub use blobber_allocation::{Allocation, ChainClient, StorageAllocation, Transaction};
pub use blobber_proof::{ObjectPath, ReferencePath, MAX_RECURSION_DEPTH};
pub use blobber_protocol::{BlobberMessage, CallerIdentity};
pub use blobber_reference::{FileUpdate, TreeMutation};
pub use blobber_types::AllocationPath;
pub use blobber_writemarker::{MarkerEntry, WriteMarker};
