use blobber_crypto::{MerkleProof, MerkleTree, BLOCK_SIZE};

use crate::hash::content_hash;
use crate::model::FileMeta;

/// New content and metadata for a file, as produced by an upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileUpdate {
    pub meta: FileMeta,
    pub size: i64,
    pub num_blocks: i64,
    pub custom_meta: String,
}

impl FileUpdate {
    /// Derive hashes and block accounting from the stored bytes.
    pub fn from_content(content: &[u8]) -> Self {
        let hash = content_hash(content);
        let size = i64::try_from(content.len()).unwrap_or(i64::MAX);
        let blocks = i64::try_from(content.len().div_ceil(BLOCK_SIZE)).unwrap_or(i64::MAX);
        Self {
            meta: FileMeta {
                content_hash: hash.clone(),
                merkle_root: MerkleTree::from_content(content).root().to_hex(),
                actual_file_size: size,
                actual_file_hash: hash,
                ..FileMeta::default()
            },
            size,
            num_blocks: blocks,
            custom_meta: String::new(),
        }
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.meta.mimetype = mimetype.into();
        self
    }

    pub fn with_custom_meta(mut self, custom_meta: impl Into<String>) -> Self {
        self.custom_meta = custom_meta.into();
        self
    }

    pub fn with_encrypted_key(mut self, key: impl Into<String>) -> Self {
        self.meta.encrypted_key = key.into();
        self
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.meta.attributes = attributes.into();
        self
    }

    pub fn content_hash(&self) -> &str {
        &self.meta.content_hash
    }
}

/// Merkle inclusion proof for 1-based block `block_num` of `content`.
pub fn block_proof(content: &[u8], block_num: i64) -> Option<MerkleProof> {
    let index = usize::try_from(block_num.checked_sub(1)?).ok()?;
    MerkleTree::from_content(content).proof(index)
}
