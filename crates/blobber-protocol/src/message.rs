use serde::{Deserialize, Serialize};

use crate::auth::CallerIdentity;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTerm {
    pub id: i64,
    pub blobber_id: String,
    pub allocation_id: String,
    pub read_price: i64,
    pub write_price: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAllocation {
    pub id: String,
    pub tx: String,
    pub total_size: i64,
    pub used_size: i64,
    pub owner_id: String,
    pub owner_public_key: String,
    pub payer_id: String,
    pub payer_public_key: String,
    pub blobber_size: i64,
    pub blobber_size_used: i64,
    pub allocation_root: String,
    pub latest_redeemed_wm: String,
    pub is_redeem_required: bool,
    pub expiration: i64,
    pub time_unit: i64,
    pub finalized: bool,
    pub cleaned_up: bool,
    pub terms: Vec<WireTerm>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCommitMetaTxn {
    pub ref_id: i64,
    pub txn_id: String,
    /// Unix nanoseconds.
    pub created_at: i64,
}

/// Fields of a file ref.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFileMeta {
    pub id: i64,
    pub allocation_id: String,
    pub ref_type: String,
    pub lookup_hash: String,
    pub name: String,
    pub path: String,
    pub hash: String,
    pub num_blocks: i64,
    pub path_hash: String,
    pub custom_meta: String,
    pub content_hash: String,
    pub size: i64,
    pub merkle_root: String,
    pub actual_file_size: i64,
    pub actual_file_hash: String,
    pub mimetype: String,
    pub thumbnail_size: i64,
    pub thumbnail_hash: String,
    pub actual_thumbnail_size: i64,
    pub actual_thumbnail_hash: String,
    pub encrypted_key: String,
    pub attributes: String,
    pub on_cloud: bool,
    pub commit_meta_txns: Vec<WireCommitMetaTxn>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields of a directory ref.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDirMeta {
    pub id: i64,
    pub allocation_id: String,
    pub ref_type: String,
    pub lookup_hash: String,
    pub name: String,
    pub path: String,
    pub hash: String,
    pub num_blocks: i64,
    pub path_hash: String,
    pub size: i64,
    pub custom_meta: String,
    pub commit_meta_txns: Vec<WireCommitMetaTxn>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A ref on the wire. `ref_type` selects which of the two metas is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFileRef {
    pub ref_type: String,
    pub file_meta: Option<WireFileMeta>,
    pub dir_meta: Option<WireDirMeta>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFileStats {
    pub id: i64,
    pub ref_id: i64,
    pub num_updates: i64,
    pub num_block_downloads: i64,
    pub success_challenges: i64,
    pub failed_challenges: i64,
    pub last_challenge_response_txn: String,
    pub write_marker_redeem_txn: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireWriteMarker {
    pub allocation_root: String,
    pub previous_allocation_root: String,
    pub allocation_id: String,
    pub size: i64,
    pub blobber_id: String,
    /// Unix seconds, as signed.
    pub timestamp: i64,
    pub client_id: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCollaborator {
    pub ref_id: i64,
    pub client_id: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChildHash {
    pub name: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePathLink {
    pub meta: Option<WireFileRef>,
    pub children: Vec<WireChildHash>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireObjectPath {
    pub root_hash: String,
    pub block_num: i64,
    pub file_block_num: i64,
    pub meta: Option<WireFileRef>,
    pub links: Vec<WirePathLink>,
    pub truncated: bool,
}

/// One reference path node. `children` index into the owning
/// [`WireReferencePath::nodes`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRefNode {
    pub meta: Option<WireFileRef>,
    pub children: Vec<u32>,
}

/// A reference path as a flat arena. No wire type nests, so decoding a
/// peer's frame never recurses however deep the tree it describes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireReferencePath {
    pub nodes: Vec<WireRefNode>,
    pub root: u32,
    /// Some node was sent without its children.
    pub truncated: bool,
}

/// All message types in the blobber protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobberMessage {
    GetAllocationRequest {
        allocation_id: String,
    },
    AllocationResponse {
        allocation: Option<WireAllocation>,
    },
    GetFileMetaRequest {
        allocation_id: String,
        path: String,
    },
    FileMetaResponse {
        meta: Option<WireFileRef>,
        stats: Option<WireFileStats>,
        collaborators: Vec<WireCollaborator>,
    },
    GetObjectPathRequest {
        allocation_id: String,
        path: String,
        block_num: i64,
    },
    ObjectPathResponse {
        object_path: Option<WireObjectPath>,
        latest_write_marker: Option<WireWriteMarker>,
    },
    GetReferencePathRequest {
        allocation_id: String,
        paths: Vec<String>,
    },
    ReferencePathResponse {
        reference_path: Option<WireReferencePath>,
        latest_write_marker: Option<WireWriteMarker>,
    },
    GetObjectTreeRequest {
        allocation_id: String,
        path: String,
        caller: CallerIdentity,
    },
    ObjectTreeResponse {
        reference_path: Option<WireReferencePath>,
        latest_write_marker: Option<WireWriteMarker>,
    },
    GetLatestWriteMarkerRequest {
        allocation_id: String,
    },
    WriteMarkerResponse {
        latest: Option<WireWriteMarker>,
    },
    Error {
        code: u32,
        message: String,
    },
}

impl BlobberMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::GetAllocationRequest { .. } => 1,
            Self::AllocationResponse { .. } => 2,
            Self::GetFileMetaRequest { .. } => 3,
            Self::FileMetaResponse { .. } => 4,
            Self::GetObjectPathRequest { .. } => 5,
            Self::ObjectPathResponse { .. } => 6,
            Self::GetReferencePathRequest { .. } => 7,
            Self::ReferencePathResponse { .. } => 8,
            Self::GetObjectTreeRequest { .. } => 9,
            Self::ObjectTreeResponse { .. } => 10,
            Self::GetLatestWriteMarkerRequest { .. } => 11,
            Self::WriteMarkerResponse { .. } => 12,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GetAllocationRequest { .. } => "GetAllocationRequest",
            Self::AllocationResponse { .. } => "AllocationResponse",
            Self::GetFileMetaRequest { .. } => "GetFileMetaRequest",
            Self::FileMetaResponse { .. } => "FileMetaResponse",
            Self::GetObjectPathRequest { .. } => "GetObjectPathRequest",
            Self::ObjectPathResponse { .. } => "ObjectPathResponse",
            Self::GetReferencePathRequest { .. } => "GetReferencePathRequest",
            Self::ReferencePathResponse { .. } => "ReferencePathResponse",
            Self::GetObjectTreeRequest { .. } => "GetObjectTreeRequest",
            Self::ObjectTreeResponse { .. } => "ObjectTreeResponse",
            Self::GetLatestWriteMarkerRequest { .. } => "GetLatestWriteMarkerRequest",
            Self::WriteMarkerResponse { .. } => "WriteMarkerResponse",
            Self::Error { .. } => "Error",
        }
    }

    /// Allocation a request is scoped to. `None` for responses.
    pub fn allocation_id(&self) -> Option<&str> {
        match self {
            Self::GetAllocationRequest { allocation_id }
            | Self::GetFileMetaRequest { allocation_id, .. }
            | Self::GetObjectPathRequest { allocation_id, .. }
            | Self::GetReferencePathRequest { allocation_id, .. }
            | Self::GetObjectTreeRequest { allocation_id, .. }
            | Self::GetLatestWriteMarkerRequest { allocation_id } => Some(allocation_id),
            _ => None,
        }
    }
}
