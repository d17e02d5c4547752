use std::sync::Arc;

use blobber_reference::RefTreeStore;
use blobber_types::AllocationPath;

use crate::error::ProofResult;
use crate::object_path::ObjectPath;
use crate::reference_path::ReferencePath;
use crate::MAX_RECURSION_DEPTH;

/// Builds proofs from committed tree snapshots. Never mutates a tree.
#[derive(Clone)]
pub struct PathProofBuilder {
    trees: Arc<dyn RefTreeStore>,
    max_depth: usize,
}

impl PathProofBuilder {
    pub fn new(trees: Arc<dyn RefTreeStore>) -> Self {
        Self {
            trees,
            max_depth: MAX_RECURSION_DEPTH,
        }
    }

    /// Lower the recursion limit. Values above [`MAX_RECURSION_DEPTH`] are
    /// clamped to it.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_RECURSION_DEPTH);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn build_object_path(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        block_num: i64,
    ) -> ProofResult<ObjectPath> {
        let tree = self.trees.load(allocation_id)?;
        ObjectPath::build(&tree, path, block_num, self.max_depth)
    }

    pub fn locate_block(&self, allocation_id: &str, block_num: i64) -> ProofResult<ObjectPath> {
        let tree = self.trees.load(allocation_id)?;
        ObjectPath::locate(&tree, block_num, self.max_depth)
    }

    pub fn build_reference_path(
        &self,
        allocation_id: &str,
        paths: &[AllocationPath],
    ) -> ProofResult<ReferencePath> {
        let tree = self.trees.load(allocation_id)?;
        ReferencePath::from_paths(&tree, paths, self.max_depth)
    }

    pub fn build_object_tree(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
    ) -> ProofResult<ReferencePath> {
        let tree = self.trees.load(allocation_id)?;
        ReferencePath::subtree(&tree, path, self.max_depth)
    }
}

impl std::fmt::Debug for PathProofBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathProofBuilder")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_reference::{FileUpdate, InMemoryRefTreeStore, RefTree};

    fn builder() -> PathProofBuilder {
        let store = Arc::new(InMemoryRefTreeStore::new());
        let mut tree = RefTree::new("alloc");
        tree.upsert(
            &AllocationPath::parse("/dir/file").unwrap(),
            FileUpdate::from_content(b"content"),
        )
        .unwrap();
        store.store(tree).unwrap();
        PathProofBuilder::new(store)
    }

    #[test]
    fn depth_is_clamped() {
        assert_eq!(builder().with_max_depth(10_000).max_depth(), MAX_RECURSION_DEPTH);
        assert_eq!(builder().with_max_depth(3).max_depth(), 3);
    }

    #[test]
    fn proofs_read_committed_snapshot() {
        let builder = builder();
        let proof = builder.locate_block("alloc", 1).unwrap();
        assert_eq!(proof.meta.path.as_str(), "/dir/file");
        proof.verify().unwrap();

        let tree = builder
            .build_object_tree("alloc", &AllocationPath::root())
            .unwrap();
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn unknown_allocation_has_nothing_to_prove() {
        let builder = builder();
        assert!(builder.locate_block("other", 1).is_err());
        assert!(builder
            .build_object_path("other", &AllocationPath::root(), 0)
            .is_err());
    }
}
