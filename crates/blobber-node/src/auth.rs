//! Owner authorization for owner-only requests.

use blobber_allocation::Allocation;
use blobber_crypto::{ContentHasher, SignatureScheme, SigningKey};
use blobber_protocol::CallerIdentity;
use tracing::warn;

use crate::error::{NodeError, NodeResult};

/// `hex(H_marker(allocation_tx))`; the bytes of this string are what the
/// owner signs to prove who they are.
pub fn owner_challenge(allocation_tx: &str) -> String {
    ContentHasher::MARKER.hash_hex(allocation_tx.as_bytes())
}

/// Identity an owner presents for `allocation_tx`.
pub fn sign_as_owner(client_id: &str, key: &SigningKey, allocation_tx: &str) -> CallerIdentity {
    let signature = key.sign(owner_challenge(allocation_tx).as_bytes()).to_hex();
    CallerIdentity::new(client_id, key.verifying_key().to_hex(), signature)
}

/// Succeeds only for the allocation owner holding a valid signature.
///
/// The signature is checked against the owner key on the allocation record,
/// never against the key the caller supplies.
pub fn authorize_owner(
    allocation: &Allocation,
    caller: &CallerIdentity,
    scheme: &dyn SignatureScheme,
) -> NodeResult<()> {
    if caller.is_anonymous() || caller.client_id != allocation.owner_id {
        warn!(
            allocation = %allocation.id,
            client = %caller.client_id,
            "owner-only request from another client"
        );
        return Err(NodeError::Unauthorized(format!(
            "client {:?} is not the owner of {}",
            caller.client_id, allocation.id
        )));
    }
    if !caller.public_key.is_empty() && caller.public_key != allocation.owner_public_key {
        return Err(NodeError::Unauthorized("public key does not match owner".into()));
    }
    scheme
        .verify(
            &allocation.owner_public_key,
            owner_challenge(&allocation.tx).as_bytes(),
            &caller.signature,
        )
        .map_err(|e| {
            warn!(allocation = %allocation.id, error = %e, "owner signature rejected");
            NodeError::Unauthorized(format!("owner signature: {e}"))
        })
}
