//! The per-allocation reference tree.
//!
//! Nodes are keyed by path. Directories hold the names of their immediate
//! children; every mutation recomputes hash, size and block count for each
//! ancestor from the changed node up to the root before returning, so the
//! root hash is always a pure function of the files in the tree.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use blobber_types::{AllocationPath, EMPTY_ROOT};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::content::FileUpdate;
use crate::error::{RefError, Result};
use crate::hash::dir_hash;
use crate::model::{Collaborator, CommitMetaTxn, FileStats, Ref, RefKind};

/// A tree node: metadata plus the tree-only bookkeeping attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNode {
    pub meta: Ref,
    /// Names of immediate children. Always empty for files.
    pub children: BTreeSet<String>,
    pub collaborators: Vec<Collaborator>,
    /// Present for files only.
    pub stats: Option<FileStats>,
}

impl RefNode {
    fn new(meta: Ref) -> Self {
        Self {
            meta,
            children: BTreeSet::new(),
            collaborators: Vec::new(),
            stats: None,
        }
    }
}

/// One node and its immediate children, in name order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    pub meta: Ref,
    pub children: Vec<Ref>,
}

/// File/directory tree of one allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefTree {
    allocation_id: String,
    nodes: BTreeMap<AllocationPath, RefNode>,
    /// lookup_hash -> path
    lookup: HashMap<String, AllocationPath>,
    next_id: i64,
}

fn invalid(path: &AllocationPath, reason: &str) -> RefError {
    RefError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn not_found(path: &AllocationPath) -> RefError {
    RefError::NotFound(path.to_string())
}

impl RefTree {
    /// An empty tree. Its root hash is [`EMPTY_ROOT`].
    pub fn new(allocation_id: impl Into<String>) -> Self {
        Self {
            allocation_id: allocation_id.into(),
            nodes: BTreeMap::new(),
            lookup: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn allocation_id(&self) -> &str {
        &self.allocation_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Hash of the root directory, or [`EMPTY_ROOT`] if there is none.
    pub fn root_hash(&self) -> String {
        self.nodes
            .get(&AllocationPath::root())
            .map(|node| node.meta.hash.clone())
            .unwrap_or_else(|| EMPTY_ROOT.to_string())
    }

    /// Total bytes stored in the tree.
    pub fn total_size(&self) -> i64 {
        self.nodes
            .get(&AllocationPath::root())
            .map_or(0, |node| node.meta.size)
    }

    /// Total 64 KiB blocks stored in the tree.
    pub fn total_blocks(&self) -> i64 {
        self.nodes
            .get(&AllocationPath::root())
            .map_or(0, |node| node.meta.num_blocks)
    }

    pub fn node(&self, path: &AllocationPath) -> Option<&RefNode> {
        self.nodes.get(path)
    }

    pub fn lookup_by_path(&self, path: &AllocationPath) -> Result<&Ref> {
        self.nodes
            .get(path)
            .map(|node| &node.meta)
            .ok_or_else(|| not_found(path))
    }

    pub fn lookup_by_hash(&self, lookup_hash: &str) -> Result<&Ref> {
        self.lookup
            .get(lookup_hash)
            .and_then(|path| self.nodes.get(path))
            .map(|node| &node.meta)
            .ok_or_else(|| RefError::NotFound(lookup_hash.to_string()))
    }

    /// Immediate children of `path` in name order. Empty for files.
    pub fn child_refs(&self, path: &AllocationPath) -> Vec<&Ref> {
        let Some(node) = self.nodes.get(path) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|name| path.join(name).ok())
            .filter_map(|child| self.nodes.get(&child))
            .map(|child| &child.meta)
            .collect()
    }

    pub fn children_of(&self, path: &AllocationPath) -> Result<Listing> {
        let meta = self.lookup_by_path(path)?.clone();
        let children = self.child_refs(path).into_iter().cloned().collect();
        Ok(Listing { meta, children })
    }

    /// All refs in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Ref> {
        self.nodes.values().map(|node| &node.meta)
    }

    /// Create or update the file at `path`, creating missing parent
    /// directories, then recompute every ancestor up to the root.
    ///
    /// Fails without touching the tree if `path` is the root, names an
    /// existing directory, or lies below an existing file.
    pub fn upsert(&mut self, path: &AllocationPath, update: FileUpdate) -> Result<&Ref> {
        if path.is_root() {
            return Err(invalid(path, "the root is always a directory"));
        }
        if self.nodes.get(path).is_some_and(|node| node.meta.is_dir()) {
            return Err(invalid(path, "a directory exists at this path"));
        }
        let ancestors = path.ancestors();
        if let Some(file) = ancestors
            .iter()
            .find(|dir| self.nodes.get(*dir).is_some_and(|node| node.meta.is_file()))
        {
            return Err(invalid(path, &format!("ancestor {file} is a file")));
        }

        let now = Utc::now();
        for dir in &ancestors {
            if !self.nodes.contains_key(dir) {
                let id = self.allocate_id();
                let meta = Ref::directory(id, &self.allocation_id, dir, now);
                self.insert_node(dir.clone(), RefNode::new(meta));
                self.link(dir);
            }
        }

        let FileUpdate {
            meta,
            size,
            num_blocks,
            custom_meta,
        } = update;
        let hash = meta.content_hash.clone();

        if let Some(node) = self.nodes.get_mut(path) {
            node.meta.kind = RefKind::File(meta);
            node.meta.hash = hash;
            node.meta.size = size;
            node.meta.num_blocks = num_blocks;
            node.meta.custom_meta = custom_meta;
            node.meta.updated_at = now;
            if let Some(stats) = node.stats.as_mut() {
                stats.num_updates += 1;
                stats.updated_at = now;
            }
        } else {
            let id = self.allocate_id();
            let mut file = Ref::file(id, &self.allocation_id, path, now, meta);
            file.hash = hash;
            file.size = size;
            file.num_blocks = num_blocks;
            file.custom_meta = custom_meta;
            let mut node = RefNode::new(file);
            let mut stats = FileStats::new(id, now);
            stats.num_updates = 1;
            node.stats = Some(stats);
            self.insert_node(path.clone(), node);
            self.link(path);
        }

        self.recompute_ancestors(path, now);
        debug!(
            allocation = %self.allocation_id,
            path = %path,
            size,
            root = %self.root_hash(),
            "upserted file"
        );
        self.lookup_by_path(path)
    }

    /// Remove the subtree rooted at `path` and recompute its ancestors.
    ///
    /// Deleting `/` empties the tree.
    pub fn delete(&mut self, path: &AllocationPath) -> Result<Ref> {
        let removed = self.lookup_by_path(path)?.clone();

        let doomed: Vec<AllocationPath> = self
            .nodes
            .keys()
            .filter(|candidate| *candidate == path || path.is_ancestor_of(candidate))
            .cloned()
            .collect();
        for victim in &doomed {
            if let Some(node) = self.nodes.remove(victim) {
                self.lookup.remove(&node.meta.lookup_hash);
            }
        }

        if let Some(parent) = path.parent() {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.remove(path.name());
            }
        }
        self.recompute_ancestors(path, Utc::now());
        debug!(
            allocation = %self.allocation_id,
            path = %path,
            removed = doomed.len(),
            root = %self.root_hash(),
            "deleted subtree"
        );
        Ok(removed)
    }

    /// Grant `client_id` access to the file at `path`. Returns `false` if
    /// the client was already a collaborator.
    pub fn add_collaborator(&mut self, path: &AllocationPath, client_id: &str) -> Result<bool> {
        let node = self.file_node_mut(path)?;
        if node.collaborators.iter().any(|c| c.client_id == client_id) {
            return Ok(false);
        }
        node.collaborators.push(Collaborator {
            ref_id: node.meta.id,
            client_id: client_id.to_string(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    /// Revoke access. Returns `false` if the client was not a collaborator.
    pub fn remove_collaborator(&mut self, path: &AllocationPath, client_id: &str) -> Result<bool> {
        let node = self.file_node_mut(path)?;
        let before = node.collaborators.len();
        node.collaborators.retain(|c| c.client_id != client_id);
        Ok(node.collaborators.len() != before)
    }

    pub fn collaborators(&self, path: &AllocationPath) -> Result<&[Collaborator]> {
        self.nodes
            .get(path)
            .map(|node| node.collaborators.as_slice())
            .ok_or_else(|| not_found(path))
    }

    pub fn is_collaborator(&self, path: &AllocationPath, client_id: &str) -> bool {
        self.nodes
            .get(path)
            .is_some_and(|node| node.collaborators.iter().any(|c| c.client_id == client_id))
    }

    pub fn file_stats(&self, path: &AllocationPath) -> Result<&FileStats> {
        self.nodes
            .get(path)
            .and_then(|node| node.stats.as_ref())
            .ok_or_else(|| not_found(path))
    }

    pub fn record_block_downloads(&mut self, path: &AllocationPath, blocks: i64) -> Result<()> {
        let stats = self.stats_mut(path)?;
        stats.num_block_downloads += blocks;
        stats.updated_at = Utc::now();
        Ok(())
    }

    /// Record the outcome of a storage challenge against the file.
    pub fn record_challenge(
        &mut self,
        path: &AllocationPath,
        passed: bool,
        response_txn: &str,
    ) -> Result<()> {
        let stats = self.stats_mut(path)?;
        if passed {
            stats.success_challenges += 1;
        } else {
            stats.failed_challenges += 1;
        }
        stats.last_challenge_response_txn = response_txn.to_string();
        stats.updated_at = Utc::now();
        Ok(())
    }

    /// Attach a ledger transaction to the file's commit log.
    pub fn add_commit_meta_txn(&mut self, path: &AllocationPath, txn_id: &str) -> Result<()> {
        let node = self.file_node_mut(path)?;
        node.meta.commit_meta_txns.push(CommitMetaTxn {
            ref_id: node.meta.id,
            txn_id: txn_id.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_node(&mut self, path: AllocationPath, node: RefNode) {
        self.lookup.insert(node.meta.lookup_hash.clone(), path.clone());
        self.nodes.insert(path, node);
    }

    /// Register `path` in its parent's child set.
    fn link(&mut self, path: &AllocationPath) {
        if let Some(parent) = path.parent() {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.insert(path.name().to_string());
            }
        }
    }

    fn file_node_mut(&mut self, path: &AllocationPath) -> Result<&mut RefNode> {
        let node = self.nodes.get_mut(path).ok_or_else(|| not_found(path))?;
        if node.meta.is_dir() {
            return Err(invalid(path, "not a file"));
        }
        Ok(node)
    }

    fn stats_mut(&mut self, path: &AllocationPath) -> Result<&mut FileStats> {
        self.file_node_mut(path)?
            .stats
            .as_mut()
            .ok_or_else(|| not_found(path))
    }

    fn recompute_ancestors(&mut self, path: &AllocationPath, now: DateTime<Utc>) {
        for dir in path.ancestors().iter().rev() {
            self.recompute_dir(dir, now);
        }
    }

    fn recompute_dir(&mut self, dir: &AllocationPath, now: DateTime<Utc>) {
        let Some(node) = self.nodes.get(dir) else {
            return;
        };
        let mut entries = Vec::with_capacity(node.children.len());
        let (mut size, mut blocks) = (0i64, 0i64);
        for name in &node.children {
            let Some(child) = dir.join(name).ok().and_then(|p| self.nodes.get(&p)) else {
                continue;
            };
            size += child.meta.size;
            blocks += child.meta.num_blocks;
            entries.push((name.clone(), child.meta.hash.clone()));
        }
        let hash = dir_hash(entries.iter().map(|(n, h)| (n.as_str(), h.as_str())));

        if let Some(node) = self.nodes.get_mut(dir) {
            node.meta.hash = hash;
            node.meta.size = size;
            node.meta.num_blocks = blocks;
            node.meta.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::lookup_hash;
    use proptest::prelude::*;

    fn p(s: &str) -> AllocationPath {
        AllocationPath::parse(s).unwrap()
    }

    fn tree_with(files: &[(&str, &str)]) -> RefTree {
        let mut tree = RefTree::new("alloc");
        for (path, content) in files {
            tree.upsert(&p(path), FileUpdate::from_content(content.as_bytes()))
                .unwrap();
        }
        tree
    }

    #[test]
    fn empty_tree_has_empty_root() {
        let tree = RefTree::new("alloc");
        assert_eq!(tree.root_hash(), EMPTY_ROOT);
        assert_eq!(tree.total_size(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn upsert_creates_parent_directories() {
        let tree = tree_with(&[("/docs/reports/q1.txt", "quarter")]);
        assert_eq!(tree.len(), 4);
        assert!(tree.lookup_by_path(&p("/docs")).unwrap().is_dir());
        assert!(tree.lookup_by_path(&p("/docs/reports")).unwrap().is_dir());
        assert_ne!(tree.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn directory_aggregates_children() {
        let tree = tree_with(&[("/d/a", "aaa"), ("/d/b", "bb"), ("/c", "c")]);
        let d = tree.lookup_by_path(&p("/d")).unwrap();
        let a = tree.lookup_by_path(&p("/d/a")).unwrap();
        let b = tree.lookup_by_path(&p("/d/b")).unwrap();
        assert_eq!(d.size, 5);
        assert_eq!(d.num_blocks, 2);
        assert_eq!(d.hash, dir_hash([("a", a.hash.as_str()), ("b", b.hash.as_str())]));
        assert_eq!(tree.total_size(), 6);
        assert_eq!(tree.total_blocks(), 3);
    }

    #[test]
    fn root_hash_changes_with_content() {
        let first = tree_with(&[("/a", "one")]).root_hash();
        let second = tree_with(&[("/a", "two")]).root_hash();
        assert_ne!(first, second);
    }

    #[test]
    fn update_keeps_identity_and_bumps_stats() {
        let mut tree = tree_with(&[("/a", "one")]);
        let before = tree.lookup_by_path(&p("/a")).unwrap().clone();
        tree.upsert(&p("/a"), FileUpdate::from_content(b"two!"))
            .unwrap();
        let after = tree.lookup_by_path(&p("/a")).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.size, 4);
        assert_eq!(tree.file_stats(&p("/a")).unwrap().num_updates, 2);
    }

    #[test]
    fn rejects_conflicting_shapes_without_mutation() {
        let mut tree = tree_with(&[("/file", "x"), ("/dir/child", "y")]);
        let snapshot = tree.clone();

        let below_file = tree.upsert(&p("/file/nested"), FileUpdate::from_content(b"z"));
        assert!(matches!(below_file, Err(RefError::InvalidPath { .. })));
        let onto_dir = tree.upsert(&p("/dir"), FileUpdate::from_content(b"z"));
        assert!(matches!(onto_dir, Err(RefError::InvalidPath { .. })));
        let onto_root = tree.upsert(&AllocationPath::root(), FileUpdate::from_content(b"z"));
        assert!(matches!(onto_root, Err(RefError::InvalidPath { .. })));

        assert_eq!(tree, snapshot);
    }

    #[test]
    fn delete_removes_subtree_and_recomputes() {
        let mut tree = tree_with(&[("/d/a", "aaa"), ("/d/e/b", "bb"), ("/c", "c")]);
        let removed = tree.delete(&p("/d")).unwrap();
        assert!(removed.is_dir());
        assert!(tree.lookup_by_path(&p("/d/e/b")).is_err());
        assert_eq!(tree.total_size(), 1);
        assert_eq!(tree.root_hash(), tree_with(&[("/c", "c")]).root_hash());
    }

    #[test]
    fn delete_respects_component_boundaries() {
        let mut tree = tree_with(&[("/a/x", "1"), ("/a-b", "2"), ("/ab", "3")]);
        tree.delete(&p("/a")).unwrap();
        assert!(tree.lookup_by_path(&p("/a-b")).is_ok());
        assert!(tree.lookup_by_path(&p("/ab")).is_ok());
    }

    #[test]
    fn delete_root_empties_tree() {
        let mut tree = tree_with(&[("/a", "1"), ("/b/c", "2")]);
        tree.delete(&AllocationPath::root()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root_hash(), EMPTY_ROOT);
        assert!(tree.lookup_by_hash(&lookup_hash("alloc", &p("/a"))).is_err());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut tree = RefTree::new("alloc");
        assert!(matches!(tree.delete(&p("/nope")), Err(RefError::NotFound(_))));
    }

    #[test]
    fn lookup_by_hash_finds_node() {
        let tree = tree_with(&[("/a/b", "x")]);
        let found = tree.lookup_by_hash(&lookup_hash("alloc", &p("/a/b"))).unwrap();
        assert_eq!(found.path, p("/a/b"));
        assert!(matches!(tree.lookup_by_hash("missing"), Err(RefError::NotFound(_))));
    }

    #[test]
    fn children_listed_in_name_order() {
        let tree = tree_with(&[("/d/zeta", "1"), ("/d/alpha", "2"), ("/d/mid/x", "3")]);
        let listing = tree.children_of(&p("/d")).unwrap();
        let names: Vec<&str> = listing.children.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert!(tree.children_of(&p("/d/alpha")).unwrap().children.is_empty());
    }

    #[test]
    fn collaborators_per_file() {
        let mut tree = tree_with(&[("/a", "1")]);
        assert!(tree.add_collaborator(&p("/a"), "c1").unwrap());
        assert!(!tree.add_collaborator(&p("/a"), "c1").unwrap());
        assert!(tree.is_collaborator(&p("/a"), "c1"));
        let id = tree.lookup_by_path(&p("/a")).unwrap().id;
        assert_eq!(tree.collaborators(&p("/a")).unwrap()[0].ref_id, id);

        assert!(tree.remove_collaborator(&p("/a"), "c1").unwrap());
        assert!(!tree.remove_collaborator(&p("/a"), "c1").unwrap());
        assert!(!tree.is_collaborator(&p("/a"), "c1"));
        assert!(matches!(
            tree.add_collaborator(&AllocationPath::root(), "c1"),
            Err(RefError::InvalidPath { .. })
        ));
    }

    #[test]
    fn stats_and_commit_log_do_not_touch_hashes() {
        let mut tree = tree_with(&[("/a", "1")]);
        let root = tree.root_hash();
        tree.record_block_downloads(&p("/a"), 3).unwrap();
        tree.record_challenge(&p("/a"), true, "ch1").unwrap();
        tree.record_challenge(&p("/a"), false, "ch2").unwrap();
        tree.add_commit_meta_txn(&p("/a"), "txn").unwrap();

        let stats = tree.file_stats(&p("/a")).unwrap();
        assert_eq!(stats.num_block_downloads, 3);
        assert_eq!(stats.success_challenges, 1);
        assert_eq!(stats.failed_challenges, 1);
        assert_eq!(stats.last_challenge_response_txn, "ch2");
        assert_eq!(tree.lookup_by_path(&p("/a")).unwrap().commit_meta_txns.len(), 1);
        assert_eq!(tree.root_hash(), root);
    }

    #[test]
    fn trees_are_isolated_by_allocation() {
        let mut one = RefTree::new("one");
        let mut two = RefTree::new("two");
        one.upsert(&p("/a"), FileUpdate::from_content(b"x")).unwrap();
        two.upsert(&p("/a"), FileUpdate::from_content(b"x")).unwrap();
        let one_ref = one.lookup_by_path(&p("/a")).unwrap();
        let two_ref = two.lookup_by_path(&p("/a")).unwrap();
        assert_ne!(one_ref.lookup_hash, two_ref.lookup_hash);
        assert!(one.lookup_by_hash(&two_ref.lookup_hash).is_err());
    }

    fn file_sets() -> impl Strategy<Value = (Vec<(String, Vec<u8>)>, Vec<(String, Vec<u8>)>)> {
        prop::collection::btree_map(
            "(/d[a-c]){0,2}/f[a-c]{1,2}",
            prop::collection::vec(any::<u8>(), 0..64),
            1..10,
        )
        .prop_map(|files| files.into_iter().collect::<Vec<_>>())
        .prop_flat_map(|files| (Just(files.clone()), Just(files).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn root_hash_is_order_independent((ordered, shuffled) in file_sets()) {
            let mut first = RefTree::new("alloc");
            for (path, content) in &ordered {
                first.upsert(&p(path), FileUpdate::from_content(content)).unwrap();
            }
            let mut second = RefTree::new("alloc");
            for (path, content) in &shuffled {
                second.upsert(&p(path), FileUpdate::from_content(content)).unwrap();
            }
            prop_assert_eq!(first.root_hash(), second.root_hash());
            prop_assert_eq!(first.total_size(), second.total_size());
        }
    }
}
