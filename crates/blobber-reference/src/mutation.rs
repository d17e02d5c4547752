use blobber_types::AllocationPath;

use crate::content::FileUpdate;
use crate::error::Result;
use crate::tree::RefTree;

/// One structural change to a reference tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    Upsert {
        path: AllocationPath,
        update: FileUpdate,
    },
    Delete {
        path: AllocationPath,
    },
}

/// An ordered batch of changes authorized by a single write marker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeMutation {
    changes: Vec<TreeChange>,
}

impl TreeMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, path: AllocationPath, update: FileUpdate) -> Self {
        self.changes.push(TreeChange::Upsert { path, update });
        self
    }

    pub fn delete(mut self, path: AllocationPath) -> Self {
        self.changes.push(TreeChange::Delete { path });
        self
    }

    pub fn push(&mut self, change: TreeChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[TreeChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply every change in order. Stops at the first failure, leaving
    /// `tree` partially modified; callers apply to a private copy.
    pub fn apply(&self, tree: &mut RefTree) -> Result<()> {
        for change in &self.changes {
            match change {
                TreeChange::Upsert { path, update } => {
                    tree.upsert(path, update.clone())?;
                }
                TreeChange::Delete { path } => {
                    tree.delete(path)?;
                }
            }
        }
        Ok(())
    }

    /// Root hash the mutation produces on top of `base`, without touching it.
    pub fn preview_root(&self, base: &RefTree) -> Result<String> {
        let mut scratch = base.clone();
        self.apply(&mut scratch)?;
        Ok(scratch.root_hash())
    }
}
