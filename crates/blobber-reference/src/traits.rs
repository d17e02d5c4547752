//! The [`RefTreeStore`] trait defining where committed trees live.

use std::sync::Arc;

use crate::error::Result;
use crate::tree::RefTree;

/// Storage backend for committed reference trees, one per allocation.
///
/// Readers receive an immutable snapshot and never block writers; a writer
/// builds a new tree privately and publishes it with [`store`](Self::store),
/// which replaces the snapshot atomically. Serializing writers is the
/// caller's job (the write-marker ledger holds a per-allocation scope).
pub trait RefTreeStore: Send + Sync {
    /// The committed tree for `allocation_id`, or an empty tree if nothing
    /// has been committed yet.
    fn load(&self, allocation_id: &str) -> Result<Arc<RefTree>>;

    /// Publish `tree` as the committed tree of its allocation.
    fn store(&self, tree: RefTree) -> Result<Arc<RefTree>>;
}
