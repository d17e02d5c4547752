//! Write markers and the per-allocation commit protocol.
//!
//! A write marker is a client-signed statement that an allocation moves from
//! `previous_allocation_root` to `allocation_root` with a given size change.
//! Markers chain by root: each committed marker's previous root equals the
//! root committed before it, starting from the empty root.
//!
//! # Commit
//!
//! [`WriteMarkerLedger::commit_write`] validates a marker, applies the
//! paired [`TreeMutation`](blobber_reference::TreeMutation) to a private copy
//! of the committed tree, and publishes the tree, the marker, and the updated
//! allocation together. If the mutated tree does not hash to the signed root,
//! nothing is published.
//!
//! # Rejections
//!
//! | Check | Error |
//! |-------|-------|
//! | names another allocation or blobber | [`MarkerError::InvalidMarker`] |
//! | previous root is not the current root | [`MarkerError::StaleRoot`] |
//! | signer is not owner or payer, or signature fails | [`MarkerError::InvalidSignature`] |
//! | older than the last committed marker | [`MarkerError::OutOfOrder`] |
//! | tree does not hash to the signed root | [`MarkerError::RootMismatch`] |
//! | declared size differs from tree delta | [`MarkerError::SizeMismatch`] |
//! | usage would exceed this node's share | [`MarkerError::QuotaExceeded`] |

pub mod error;
pub mod ledger;
pub mod marker;
pub mod memory;
pub mod traits;
pub mod validation;

pub use error::{MarkerError, MarkerResult};
pub use ledger::{ScopePhase, WriteMarkerLedger, WriteScope};
pub use marker::{MarkerEntry, MarkerStatus, WriteMarker};
pub use memory::InMemoryMarkerStore;
pub use traits::MarkerStore;
pub use validation::{ChainReport, ChainValidator, Violation, ViolationKind};
