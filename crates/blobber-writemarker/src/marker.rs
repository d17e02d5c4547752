use blobber_crypto::{ContentHasher, RootLink, SignatureError, SignatureScheme, SigningKey};
use blobber_types::Timestamp;
use serde::{Deserialize, Serialize};

/// A client-signed authorization moving an allocation from one root to the
/// next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteMarker {
    /// Root hash after the write.
    pub allocation_root: String,
    /// Root hash the write builds on.
    pub previous_allocation_root: String,
    pub allocation_id: String,
    /// Signed size change in bytes.
    pub size: i64,
    pub blobber_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: Timestamp,
    pub client_id: String,
    /// Hex signature over [`signed_message`](Self::signed_message).
    pub signature: String,
}

impl WriteMarker {
    /// The canonical text every field is bound into.
    pub fn payload(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.allocation_root,
            self.previous_allocation_root,
            self.allocation_id,
            self.blobber_id,
            self.client_id,
            self.size,
            self.timestamp
        )
    }

    /// `hex(H_marker(payload))`; the bytes of this string are what gets signed.
    pub fn signed_message(&self) -> String {
        ContentHasher::MARKER.hash_hex(self.payload().as_bytes())
    }

    /// Sign with `key`, replacing any existing signature.
    pub fn signed(mut self, key: &SigningKey) -> Self {
        self.signature = key.sign(self.signed_message().as_bytes()).to_hex();
        self
    }

    /// Verify the signature against `public_key` (hex).
    pub fn verify(
        &self,
        scheme: &dyn SignatureScheme,
        public_key: &str,
    ) -> Result<(), SignatureError> {
        scheme.verify(public_key, self.signed_message().as_bytes(), &self.signature)
    }
}

impl RootLink for WriteMarker {
    fn previous_root(&self) -> &str {
        &self.previous_allocation_root
    }

    fn new_root(&self) -> &str {
        &self.allocation_root
    }
}

/// Settlement status of a committed marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerStatus {
    /// Accepted locally; not yet settled on the ledger.
    Committed,
    /// Settled by a ledger transaction.
    Redeemed,
}

/// A committed marker as persisted in the per-allocation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub marker: WriteMarker,
    /// 1-based position in the allocation's chain.
    pub seq: u64,
    pub status: MarkerStatus,
    pub redeem_txn: Option<String>,
}

impl MarkerEntry {
    pub fn is_redeemed(&self) -> bool {
        self.status == MarkerStatus::Redeemed
    }
}

impl RootLink for MarkerEntry {
    fn previous_root(&self) -> &str {
        &self.marker.previous_allocation_root
    }

    fn new_root(&self) -> &str {
        &self.marker.allocation_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_crypto::Ed25519Scheme;

    fn sample() -> WriteMarker {
        WriteMarker {
            allocation_root: "new".into(),
            previous_allocation_root: "old".into(),
            allocation_id: "alloc".into(),
            size: -12,
            blobber_id: "b1".into(),
            timestamp: 1_700_000_000,
            client_id: "owner".into(),
            signature: String::new(),
        }
    }

    #[test]
    fn payload_binds_every_field_in_order() {
        assert_eq!(sample().payload(), "new:old:alloc:b1:owner:-12:1700000000");
    }

    #[test]
    fn signature_verifies_with_signer_key() {
        let key = SigningKey::from_bytes([1; 32]);
        let marker = sample().signed(&key);
        assert!(marker
            .verify(&Ed25519Scheme, &key.verifying_key().to_hex())
            .is_ok());
    }

    #[test]
    fn any_field_change_breaks_signature() {
        let key = SigningKey::from_bytes([1; 32]);
        let pk = key.verifying_key().to_hex();
        let marker = sample().signed(&key);

        let mut bigger = marker.clone();
        bigger.size = 12;
        assert!(bigger.verify(&Ed25519Scheme, &pk).is_err());

        let mut moved = marker.clone();
        moved.blobber_id = "b2".into();
        assert!(moved.verify(&Ed25519Scheme, &pk).is_err());
    }

    #[test]
    fn entries_link_by_root() {
        let entry = MarkerEntry {
            marker: sample(),
            seq: 1,
            status: MarkerStatus::Committed,
            redeem_txn: None,
        };
        assert_eq!(entry.previous_root(), "old");
        assert_eq!(entry.new_root(), "new");
        assert!(!entry.is_redeemed());
    }

    #[test]
    fn signed_marker_survives_json() {
        let key = SigningKey::from_bytes([3; 32]);
        let marker = sample().signed(&key);
        let json = serde_json::to_string(&marker).unwrap();
        let parsed: WriteMarker = serde_json::from_str(&json).unwrap();
        assert!(parsed
            .verify(&Ed25519Scheme, &key.verifying_key().to_hex())
            .is_ok());
    }
}
