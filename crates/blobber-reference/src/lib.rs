//! Hash-aggregating reference tree for blobber allocations.
//!
//! Every allocation stored on this node has a tree of file and directory
//! references. A file's hash is the hash of its content; a directory's hash
//! aggregates its children's names and hashes, so the root hash commits to
//! the entire allocation and is what write markers sign.
//!
//! # Key Types
//!
//! - [`Ref`] / [`RefKind`] -- node metadata; file-only fields in [`FileMeta`]
//! - [`RefTree`] -- the tree with bottom-up hash maintenance
//! - [`TreeMutation`] -- a batch of upserts and deletes applied atomically by
//!   the write-marker ledger
//! - [`RefTreeStore`] -- committed tree snapshots, one per allocation
//!
//! # Hashes
//!
//! - `path_hash = hex(H_path(path))`
//! - `lookup_hash = hex(H_path(allocation_id:path))`
//! - `dir_hash = hex(H_dir("name:hash:name:hash..."))`, children in name order

pub mod content;
pub mod error;
pub mod hash;
pub mod memory;
pub mod model;
pub mod mutation;
pub mod traits;
pub mod tree;

pub use content::{block_proof, FileUpdate};
pub use error::{RefError, Result};
pub use hash::{content_hash, dir_hash, lookup_hash, path_hash};
pub use memory::InMemoryRefTreeStore;
pub use model::{
    Collaborator, CommitMetaTxn, FileMeta, FileStats, Ref, RefKind, DIRECTORY, FILE,
};
pub use mutation::{TreeChange, TreeMutation};
pub use traits::RefTreeStore;
pub use tree::{Listing, RefNode, RefTree};
