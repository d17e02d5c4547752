//! In-memory reference tree store for testing and ephemeral use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{RefError, Result};
use crate::traits::RefTreeStore;
use crate::tree::RefTree;

/// An in-memory implementation of [`RefTreeStore`].
///
/// Trees are held as `Arc` snapshots in a `HashMap` behind a `RwLock`, so a
/// load is a pointer clone. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefTreeStore {
    trees: RwLock<HashMap<String, Arc<RefTree>>>,
}

impl InMemoryRefTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocations with a committed tree.
    pub fn len(&self) -> usize {
        self.trees.read().map(|trees| trees.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RefError {
    RefError::Store(format!("lock poisoned: {e}"))
}

impl RefTreeStore for InMemoryRefTreeStore {
    fn load(&self, allocation_id: &str) -> Result<Arc<RefTree>> {
        let trees = self.trees.read().map_err(poisoned)?;
        Ok(trees
            .get(allocation_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(RefTree::new(allocation_id))))
    }

    fn store(&self, tree: RefTree) -> Result<Arc<RefTree>> {
        let snapshot = Arc::new(tree);
        let mut trees = self.trees.write().map_err(poisoned)?;
        trees.insert(snapshot.allocation_id().to_string(), snapshot.clone());
        Ok(snapshot)
    }
}
