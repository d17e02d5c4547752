//! Cryptographic capabilities for the blobber core.
//!
//! Provides domain-separated BLAKE3 hashing, Ed25519 signing/verification
//! behind the [`SignatureScheme`] capability, binary Merkle trees over file
//! blocks, and root-chain verification for write markers.
//!
//! All crypto operations wrap established libraries; nothing here is custom
//! cryptography.

pub mod chain;
pub mod hasher;
pub mod merkle;
pub mod scheme;
pub mod signer;

pub use chain::{ChainError, RootChainVerifier, RootLink};
pub use hasher::{ContentHasher, HasherError};
pub use merkle::{MerkleProof, MerkleTree, Side, BLOCK_SIZE};
pub use scheme::{Ed25519Scheme, SignatureScheme};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
