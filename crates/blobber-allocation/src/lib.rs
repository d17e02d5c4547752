//! Allocation verification for the blobber core.
//!
//! An allocation is a client's storage contract, created by a ledger
//! transaction and split across a set of storage nodes. Before this node
//! serves any request for an allocation it must know that the allocation
//! exists on the ledger, that this node is one of its participants, and how
//! much space is its share.
//!
//! # Components
//!
//! - [`ChainClient`] -- async ledger query capability
//! - [`AllocationStore`] -- persisted allocation rows, one per ID
//! - [`AllocationRegistry`] -- verify-then-cache front door over both
//!
//! # Rules
//!
//! 1. A locally persisted allocation is returned as-is; the ledger is not
//!    consulted again.
//! 2. First-time verification persists through an atomic find-or-create, so
//!    concurrent callers converge on one row.
//! 3. This node's share is `ceil(total_size / participants)`.

pub mod chain;
pub mod error;
pub mod memory;
pub mod model;
pub mod registry;
pub mod traits;

pub use chain::{ChainClient, LedgerError, Transaction};
pub use error::{AllocationError, AllocationResult};
pub use memory::{InMemoryAllocationStore, StaticChainClient};
pub use model::{
    blobber_share, Allocation, BlobberConnection, PriceTerms, StorageAllocation, Terms,
};
pub use registry::AllocationRegistry;
pub use traits::AllocationStore;
