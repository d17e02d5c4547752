//! Wire protocol for the blobber core.
//!
//! Two layers:
//!
//! - [`convert`] maps entities (allocations, refs, file stats, write
//!   markers, collaborators, object paths, reference paths) to flat wire
//!   structs and back. `None` in gives `None` out; record timestamps are
//!   signed Unix nanoseconds; reference paths travel as flat arenas and are
//!   depth-capped in both directions.
//! - [`BlobberCodec`] frames a [`BlobberMessage`] as
//!   `[u32 len][u8 tag][bincode payload]`.

pub mod auth;
pub mod codec;
pub mod convert;
pub mod error;
pub mod message;

pub use auth::CallerIdentity;
pub use codec::BlobberCodec;
pub use convert::{
    from_wire_allocation, from_wire_collaborator, from_wire_file_stats, from_wire_object_path,
    from_wire_ref, from_wire_reference_path, from_wire_write_marker, to_wire_allocation,
    to_wire_collaborator, to_wire_file_stats, to_wire_object_path, to_wire_ref,
    to_wire_reference_path, to_wire_write_marker,
};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    BlobberMessage, WireAllocation, WireChildHash, WireCollaborator, WireCommitMetaTxn,
    WireDirMeta, WireFileMeta, WireFileRef, WireFileStats, WireObjectPath, WirePathLink,
    WireRefNode, WireReferencePath, WireTerm, WireWriteMarker, MAX_MESSAGE_SIZE,
    PROTOCOL_VERSION,
};
