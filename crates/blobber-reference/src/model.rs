//! Reference tree entities.
//!
//! A [`Ref`] is the flat metadata record of one tree node. Whether it is a
//! file or a directory is carried by [`RefKind`]; file-only fields live in
//! [`FileMeta`], so a directory can never carry a content hash.

use blobber_types::AllocationPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::{lookup_hash, path_hash};

/// Type tag for file refs as carried on the wire.
pub const FILE: &str = "f";
/// Type tag for directory refs as carried on the wire.
pub const DIRECTORY: &str = "d";

/// A ledger transaction recorded against a file's metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetaTxn {
    pub ref_id: i64,
    pub txn_id: String,
    pub created_at: DateTime<Utc>,
}

/// File-only metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub content_hash: String,
    /// Merkle root over the file's 64 KiB block hashes.
    pub merkle_root: String,
    pub actual_file_size: i64,
    pub actual_file_hash: String,
    pub mimetype: String,
    pub thumbnail_size: i64,
    pub thumbnail_hash: String,
    pub actual_thumbnail_size: i64,
    pub actual_thumbnail_hash: String,
    pub encrypted_key: String,
    /// Opaque JSON attributes set by the client.
    pub attributes: String,
    pub on_cloud: bool,
}

/// File or directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    File(FileMeta),
    Directory,
}

/// One node of an allocation's reference tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub id: i64,
    pub allocation_id: String,
    pub name: String,
    pub path: AllocationPath,
    pub path_hash: String,
    pub lookup_hash: String,
    /// Content hash for files; aggregate of children for directories.
    pub hash: String,
    /// Bytes for files; sum over descendants for directories.
    pub size: i64,
    pub num_blocks: i64,
    pub custom_meta: String,
    pub commit_meta_txns: Vec<CommitMetaTxn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub kind: RefKind,
}

impl Ref {
    /// A new, empty directory node.
    pub fn directory(id: i64, allocation_id: &str, path: &AllocationPath, now: DateTime<Utc>) -> Self {
        Self::with_kind(id, allocation_id, path, now, RefKind::Directory)
    }

    /// A new file node with the given metadata and no content accounting yet.
    pub fn file(
        id: i64,
        allocation_id: &str,
        path: &AllocationPath,
        now: DateTime<Utc>,
        meta: FileMeta,
    ) -> Self {
        Self::with_kind(id, allocation_id, path, now, RefKind::File(meta))
    }

    fn with_kind(
        id: i64,
        allocation_id: &str,
        path: &AllocationPath,
        now: DateTime<Utc>,
        kind: RefKind,
    ) -> Self {
        Self {
            id,
            allocation_id: allocation_id.to_string(),
            name: path.name().to_string(),
            path: path.clone(),
            path_hash: path_hash(path),
            lookup_hash: lookup_hash(allocation_id, path),
            hash: String::new(),
            size: 0,
            num_blocks: 0,
            custom_meta: String::new(),
            commit_meta_txns: Vec::new(),
            created_at: now,
            updated_at: now,
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, RefKind::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, RefKind::Directory)
    }

    pub fn file_meta(&self) -> Option<&FileMeta> {
        match &self.kind {
            RefKind::File(meta) => Some(meta),
            RefKind::Directory => None,
        }
    }

    /// Wire type tag: [`FILE`] or [`DIRECTORY`].
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            RefKind::File(_) => FILE,
            RefKind::Directory => DIRECTORY,
        }
    }
}

/// A client granted access to a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub ref_id: i64,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
}

/// Per-file usage and audit counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub id: i64,
    pub ref_id: i64,
    pub num_updates: i64,
    pub num_block_downloads: i64,
    pub success_challenges: i64,
    pub failed_challenges: i64,
    pub last_challenge_response_txn: String,
    pub write_marker_redeem_txn: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileStats {
    pub fn new(ref_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: ref_id,
            ref_id,
            num_updates: 0,
            num_block_downloads: 0,
            success_challenges: 0,
            failed_challenges: 0,
            last_challenge_response_txn: String::new(),
            write_marker_redeem_txn: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
