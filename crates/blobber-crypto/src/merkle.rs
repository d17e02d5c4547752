use blobber_types::Digest;
use serde::{Deserialize, Serialize};

use crate::hasher::ContentHasher;

/// Size of one content block, the unit of challenge and proof.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree over the fixed-size blocks of a file.
///
/// Leaves are block hashes; the root is recorded on the file's reference
/// as its `merkle_root`, and an inclusion proof lets a verifier check a
/// single challenged block without the rest of the file.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: Digest,
    /// Level 0 holds the leaves; the last level holds the root.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Split `data` into [`BLOCK_SIZE`] chunks and build the tree over them.
    pub fn from_content(data: &[u8]) -> Self {
        let leaves = data
            .chunks(BLOCK_SIZE)
            .map(|block| ContentHasher::BLOCK.hash(block))
            .collect();
        Self::from_leaves(leaves)
    }

    /// Build a tree from precomputed leaf hashes.
    ///
    /// An empty list produces a null root. A single leaf is its own root.
    pub fn from_leaves(leaves: Vec<Digest>) -> Self {
        if leaves.is_empty() {
            return Self {
                root: Digest::null(),
                levels: vec![],
            };
        }

        let mut levels = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Digest> = current
                .chunks(2)
                // Odd node pairs with itself
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }

        let root = levels
            .last()
            .and_then(|top| top.first().copied())
            .unwrap_or_else(Digest::null);
        Self { root, levels }
    }

    pub fn root(&self) -> Digest {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Inclusion proof for the block at zero-based `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        let leaf = *leaves.get(index)?;

        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
            let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
            path.push((sibling, side));
            idx /= 2;
        }

        Some(MerkleProof {
            leaf,
            path,
            root: self.root,
        })
    }
}

/// Merkle inclusion proof for one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Digest,
    /// (sibling_hash, sibling_side) pairs from leaf to root.
    pub path: Vec<(Digest, Side)>,
    pub root: Digest,
}

impl MerkleProof {
    /// Recompute the root from the leaf and path.
    pub fn verify(&self) -> bool {
        let computed = self.path.iter().fold(self.leaf, |current, (sibling, side)| match side {
            Side::Left => hash_pair(sibling, &current),
            Side::Right => hash_pair(&current, sibling),
        });
        computed == self.root
    }

    /// Check that `block` is the content this proof commits to.
    pub fn covers(&self, block: &[u8]) -> bool {
        ContentHasher::BLOCK.verify(block, &self.leaf)
    }
}

fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"blobber-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::from_hash(*hasher.finalize().as_bytes())
}
