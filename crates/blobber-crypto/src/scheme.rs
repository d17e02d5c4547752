use crate::signer::{Signature, SignatureError, VerifyingKey};

/// Signature verification capability.
///
/// Keys and signatures arrive hex-encoded, exactly as they are stored on
/// allocation records and carried in write markers. Core logic depends only
/// on this trait, so tests can plug in deterministic stand-ins.
pub trait SignatureScheme: Send + Sync {
    /// Verify `signature_hex` over `message` with `public_key_hex`.
    fn verify(
        &self,
        public_key_hex: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), SignatureError>;
}

/// Ed25519 verification over hex-encoded keys and signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn verify(
        &self,
        public_key_hex: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), SignatureError> {
        let key = VerifyingKey::from_hex(public_key_hex)?;
        let signature = Signature::from_hex(signature_hex)?;
        key.verify(message, &signature)
    }
}
