//! Arena-backed reference paths and object trees.
//!
//! Nodes refer to their children by index into one flat vector. Nothing
//! about the indices is trusted: a walk visits each slot at most once and
//! never descends past its depth limit, so an arena whose child points back
//! at an ancestor still terminates.

use std::collections::{BTreeSet, HashSet};

use blobber_reference::{Ref, RefTree};
use blobber_types::AllocationPath;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProofResult;

/// One arena slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub meta: Ref,
    /// Arena indices of children, in name order.
    pub children: Vec<usize>,
}

/// A snapshot of part of a reference tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePath {
    pub nodes: Vec<PathNode>,
    /// Index of the top node; `None` for an empty snapshot.
    pub root: Option<usize>,
    /// Some node was emitted without its children because of the depth
    /// limit or because it was reached twice.
    pub truncated: bool,
}

impl ReferencePath {
    /// Assemble from raw parts, typically decoded from a peer.
    pub fn from_parts(nodes: Vec<PathNode>, root: Option<usize>) -> Self {
        Self {
            nodes,
            root,
            truncated: false,
        }
    }

    /// The requested `paths` and every ancestor of each, nothing else.
    pub fn from_paths(
        tree: &RefTree,
        paths: &[AllocationPath],
        max_depth: usize,
    ) -> ProofResult<Self> {
        let mut keep = BTreeSet::new();
        for path in paths {
            tree.lookup_by_path(path)?;
            keep.extend(path.ancestors());
            keep.insert(path.clone());
        }
        if keep.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self::collect(tree, &AllocationPath::root(), max_depth, &|path| {
            keep.contains(path)
        }))
    }

    /// The full subtree at `path`.
    pub fn subtree(tree: &RefTree, path: &AllocationPath, max_depth: usize) -> ProofResult<Self> {
        tree.lookup_by_path(path)?;
        Ok(Self::collect(tree, path, max_depth, &|_| true))
    }

    fn collect(
        tree: &RefTree,
        top: &AllocationPath,
        max_depth: usize,
        include: &dyn Fn(&AllocationPath) -> bool,
    ) -> Self {
        let mut out = Self::default();
        let Some(node) = tree.node(top) else {
            return out;
        };
        out.nodes.push(PathNode {
            meta: node.meta.clone(),
            children: Vec::new(),
        });
        out.root = Some(0);

        // (arena index, tree path, depth below top)
        let mut stack = vec![(0usize, top.clone(), 0usize)];
        while let Some((index, path, depth)) = stack.pop() {
            let children: Vec<&Ref> = tree
                .child_refs(&path)
                .into_iter()
                .filter(|child| include(&child.path))
                .collect();
            if children.is_empty() {
                continue;
            }
            if depth >= max_depth {
                out.mark_truncated(&path, depth);
                continue;
            }
            for child in children {
                let slot = out.nodes.len();
                out.nodes.push(PathNode {
                    meta: child.clone(),
                    children: Vec::new(),
                });
                out.nodes[index].children.push(slot);
                stack.push((slot, child.path.clone(), depth + 1));
            }
        }
        out
    }

    fn mark_truncated(&mut self, path: &AllocationPath, depth: usize) {
        if !self.truncated {
            warn!(path = %path, depth, "reference path exceeds recursion limit, truncating");
        }
        self.truncated = true;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_node(&self) -> Option<&PathNode> {
        self.root.and_then(|index| self.nodes.get(index))
    }

    /// Depth-first pre-order walk from the root, children in stored order.
    ///
    /// `visit` receives each reachable node with its depth. A node is not
    /// expanded if it sits at `max_depth` or was already visited; child
    /// indices outside the arena are skipped. Returns `true` if anything
    /// was cut short.
    pub fn walk<'a, F>(&'a self, max_depth: usize, mut visit: F) -> bool
    where
        F: FnMut(usize, &'a PathNode),
    {
        let Some(root) = self.root.filter(|&index| index < self.nodes.len()) else {
            return false;
        };
        let mut truncated = false;
        let mut seen = HashSet::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            if !seen.insert(index) {
                truncated = true;
                continue;
            }
            let node = &self.nodes[index];
            visit(depth, node);
            if node.children.is_empty() {
                continue;
            }
            if depth >= max_depth {
                truncated = true;
                continue;
            }
            for &child in node.children.iter().rev() {
                if child < self.nodes.len() {
                    stack.push((child, depth + 1));
                } else {
                    truncated = true;
                }
            }
        }
        if truncated {
            warn!(max_depth, nodes = self.nodes.len(), "malformed reference path, truncating walk");
        }
        truncated
    }

    /// Reachable refs in walk order.
    pub fn refs(&self, max_depth: usize) -> Vec<&Ref> {
        let mut refs = Vec::new();
        self.walk(max_depth, |_, node| refs.push(&node.meta));
        refs
    }

    /// Paths of all reachable refs in walk order.
    pub fn paths(&self, max_depth: usize) -> Vec<AllocationPath> {
        self.refs(max_depth)
            .into_iter()
            .map(|r| r.path.clone())
            .collect()
    }
}
