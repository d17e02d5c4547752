use blobber_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"blobber-blob-v1"`) that is
/// prepended to every hash computation, so a file body and a directory
/// listing with identical bytes hash differently.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored file content.
    pub const BLOB: Self = Self {
        domain: "blobber-blob-v1",
    };
    /// Hasher for directory child listings.
    pub const DIR: Self = Self {
        domain: "blobber-dir-v1",
    };
    /// Hasher for path and lookup indices.
    pub const PATH: Self = Self {
        domain: "blobber-path-v1",
    };
    /// Hasher for write-marker payloads and signed challenges.
    pub const MARKER: Self = Self {
        domain: "blobber-marker-v1",
    };
    /// Hasher for individual 64 KiB content blocks.
    pub const BLOCK: Self = Self {
        domain: "blobber-block-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash and hex-encode in one step.
    pub fn hash_hex(&self, data: &[u8]) -> String {
        self.hash(data).to_hex()
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
