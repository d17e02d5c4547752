//! Root-to-node inclusion proofs.
//!
//! An [`ObjectPath`] binds one node to an allocation root. Each link is a
//! directory on the way down together with the `(name, hash)` pairs of all
//! its children, which is exactly what is needed to recompute that
//! directory's hash without the rest of the tree.

use blobber_crypto::MerkleProof;
use blobber_reference::{dir_hash, Ref, RefTree};
use blobber_types::AllocationPath;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ProofError, ProofResult};

/// A child entry as folded into its parent's hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildHash {
    pub name: String,
    pub hash: String,
}

/// One directory on the path from the root to the target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLink {
    pub meta: Ref,
    /// Every child of `meta`, in name order.
    pub children: Vec<ChildHash>,
}

/// Proof that `meta` is part of the tree whose root hash is `root_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPath {
    pub root_hash: String,
    /// Block number as requested: file-local for a named path, global for a
    /// located block.
    pub block_num: i64,
    /// 1-based block within the target file.
    pub file_block_num: i64,
    /// The target node.
    pub meta: Ref,
    /// Ancestor directories, root first.
    pub links: Vec<PathLink>,
    /// Set when the target lies deeper than the recursion limit.
    pub truncated: bool,
}

impl ObjectPath {
    /// Build the proof for the node at `path`. For a file, `block_num` must
    /// name one of its blocks.
    pub fn build(
        tree: &RefTree,
        path: &AllocationPath,
        block_num: i64,
        max_depth: usize,
    ) -> ProofResult<Self> {
        let meta = tree.lookup_by_path(path)?.clone();
        if meta.is_file() && !(1..=meta.num_blocks).contains(&block_num) {
            return Err(ProofError::InvalidBlockNum {
                block_num,
                available: meta.num_blocks,
            });
        }
        Self::assemble(tree, meta, block_num, block_num, max_depth)
    }

    /// Resolve 1-based global `block_num` to the file holding it and build
    /// that file's proof.
    ///
    /// Blocks are numbered across the whole allocation by walking children
    /// in name order, so the numbering is a pure function of the tree.
    pub fn locate(tree: &RefTree, block_num: i64, max_depth: usize) -> ProofResult<Self> {
        let total = tree.total_blocks();
        if !(1..=total).contains(&block_num) {
            return Err(ProofError::InvalidBlockNum {
                block_num,
                available: total,
            });
        }

        let mut current = AllocationPath::root();
        let mut remaining = block_num;
        loop {
            let node = tree.lookup_by_path(&current)?;
            if node.is_file() {
                let meta = node.clone();
                return Self::assemble(tree, meta, block_num, remaining, max_depth);
            }
            let next = tree.child_refs(&current).into_iter().find(|child| {
                if remaining <= child.num_blocks {
                    true
                } else {
                    remaining -= child.num_blocks;
                    false
                }
            });
            match next {
                Some(child) => current = child.path.clone(),
                None => {
                    return Err(ProofError::InvalidBlockNum {
                        block_num,
                        available: total,
                    })
                }
            }
        }
    }

    fn assemble(
        tree: &RefTree,
        meta: Ref,
        block_num: i64,
        file_block_num: i64,
        max_depth: usize,
    ) -> ProofResult<Self> {
        let ancestors = meta.path.ancestors();
        let truncated = ancestors.len() > max_depth;
        if truncated {
            warn!(
                allocation = %tree.allocation_id(),
                path = %meta.path,
                depth = ancestors.len(),
                max_depth,
                "object path exceeds recursion limit, truncating"
            );
        }

        let links = ancestors
            .iter()
            .take(max_depth)
            .map(|dir| {
                let children = tree
                    .child_refs(dir)
                    .into_iter()
                    .map(|child| ChildHash {
                        name: child.name.clone(),
                        hash: child.hash.clone(),
                    })
                    .collect();
                Ok(PathLink {
                    meta: tree.lookup_by_path(dir)?.clone(),
                    children,
                })
            })
            .collect::<ProofResult<Vec<_>>>()?;

        Ok(Self {
            root_hash: tree.root_hash(),
            block_num,
            file_block_num,
            meta,
            links,
            truncated,
        })
    }

    /// Recompute every directory hash from the target up and compare the
    /// result with `root_hash`.
    pub fn verify(&self) -> ProofResult<()> {
        if self.truncated {
            return Err(ProofError::Truncated(self.links.len()));
        }

        let mut path = &self.meta.path;
        let mut name = self.meta.name.as_str();
        let mut hash = self.meta.hash.clone();
        for link in self.links.iter().rev() {
            if path.parent().as_ref() != Some(&link.meta.path) {
                return Err(mismatch(path, "link is not the parent directory"));
            }
            let listed = link.children.iter().find(|child| child.name == name);
            if listed.map(|child| &child.hash) != Some(&hash) {
                return Err(mismatch(&link.meta.path, "child hash not listed"));
            }
            let computed = dir_hash(
                link.children
                    .iter()
                    .map(|child| (child.name.as_str(), child.hash.as_str())),
            );
            if computed != link.meta.hash {
                return Err(mismatch(&link.meta.path, "directory hash does not match children"));
            }
            path = &link.meta.path;
            name = link.meta.name.as_str();
            hash = computed;
        }

        if !path.is_root() {
            return Err(mismatch(path, "path does not reach the root"));
        }
        if hash != self.root_hash {
            return Err(mismatch(path, "root hash mismatch"));
        }
        Ok(())
    }

    /// [`verify`](Self::verify), and require the stated root to be `expected`.
    pub fn verify_against(&self, expected: &str) -> ProofResult<()> {
        if self.root_hash != expected {
            return Err(mismatch(
                &AllocationPath::root(),
                &format!("proof is for root {}, expected {expected}", self.root_hash),
            ));
        }
        self.verify()
    }

    /// Check a challenged block: `block` must be covered by `proof`, `proof`
    /// must lead to the target file's Merkle root, and the file must be
    /// bound to the allocation root.
    pub fn verify_block(&self, proof: &MerkleProof, block: &[u8]) -> ProofResult<()> {
        let Some(file) = self.meta.file_meta() else {
            return Err(mismatch(&self.meta.path, "target is not a file"));
        };
        if proof.root.to_hex() != file.merkle_root {
            return Err(mismatch(&self.meta.path, "block proof is for another merkle root"));
        }
        if !proof.verify() || !proof.covers(block) {
            return Err(mismatch(&self.meta.path, "block does not verify"));
        }
        self.verify()
    }
}

fn mismatch(path: &AllocationPath, reason: &str) -> ProofError {
    ProofError::Verification {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
