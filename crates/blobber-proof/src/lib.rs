//! Proof and snapshot structures over committed reference trees.
//!
//! - [`ObjectPath`] -- binds one node (usually a challenged file block) to
//!   the allocation root through the sibling hashes of every ancestor
//! - [`ReferencePath`] -- a pruned snapshot holding requested paths and
//!   their ancestors, or a full object tree
//! - [`PathProofBuilder`] -- builds both from a [`RefTreeStore`](blobber_reference::RefTreeStore)
//!
//! All structures are depth-bounded. Past [`MAX_RECURSION_DEPTH`] a node is
//! emitted with its own metadata and no children, and the result is flagged
//! `truncated`; this is a policy, not an error.

pub mod builder;
pub mod error;
pub mod object_path;
pub mod reference_path;

pub use builder::PathProofBuilder;
pub use error::{ProofError, ProofResult};
pub use object_path::{ChildHash, ObjectPath, PathLink};
pub use reference_path::{PathNode, ReferencePath};

/// Hard ceiling on nesting for construction and translation of proofs.
/// Equal to the deepest valid path, so committed trees never exceed it.
pub const MAX_RECURSION_DEPTH: usize = blobber_types::MAX_PATH_DEPTH;
