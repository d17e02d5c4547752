use std::collections::HashMap;
use std::sync::RwLock;

use blobber_crypto::RootChainVerifier;
use blobber_types::EMPTY_ROOT;

use crate::error::MarkerError;
use crate::marker::{MarkerEntry, MarkerStatus};
use crate::traits::MarkerStore;

/// In-memory marker chains for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    chains: RwLock<HashMap<String, Vec<MarkerEntry>>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> MarkerError {
    MarkerError::Store("marker store lock poisoned".into())
}

impl MarkerStore for InMemoryMarkerStore {
    fn append(&self, entry: MarkerEntry) -> Result<MarkerEntry, MarkerError> {
        let mut chains = self.chains.write().map_err(|_| poisoned())?;
        let chain = chains.entry(entry.marker.allocation_id.clone()).or_default();

        let expected_seq = chain.len() as u64 + 1;
        if entry.seq != expected_seq {
            return Err(MarkerError::IntegrityViolation {
                seq: entry.seq,
                reason: format!("append attempted out of order; expected seq {expected_seq}"),
            });
        }

        let head_root = chain
            .last()
            .map_or(EMPTY_ROOT, |head| head.marker.allocation_root.as_str());
        RootChainVerifier::verify_chain(head_root, std::slice::from_ref(&entry)).map_err(|e| {
            MarkerError::IntegrityViolation {
                seq: entry.seq,
                reason: e.to_string(),
            }
        })?;

        chain.push(entry.clone());
        Ok(entry)
    }

    fn head(&self, allocation_id: &str) -> Result<Option<MarkerEntry>, MarkerError> {
        let chains = self.chains.read().map_err(|_| poisoned())?;
        Ok(chains.get(allocation_id).and_then(|c| c.last()).cloned())
    }

    fn read_all(&self, allocation_id: &str) -> Result<Vec<MarkerEntry>, MarkerError> {
        let chains = self.chains.read().map_err(|_| poisoned())?;
        Ok(chains.get(allocation_id).cloned().unwrap_or_default())
    }

    fn get_by_root(
        &self,
        allocation_id: &str,
        allocation_root: &str,
    ) -> Result<Option<MarkerEntry>, MarkerError> {
        let chains = self.chains.read().map_err(|_| poisoned())?;
        // The same root can recur; the latest marker producing it wins.
        Ok(chains.get(allocation_id).and_then(|chain| {
            chain
                .iter()
                .rev()
                .find(|e| e.marker.allocation_root == allocation_root)
                .cloned()
        }))
    }

    fn set_redeemed(
        &self,
        allocation_id: &str,
        allocation_root: &str,
        txn_id: &str,
    ) -> Result<MarkerEntry, MarkerError> {
        let mut chains = self.chains.write().map_err(|_| poisoned())?;
        let entry = chains
            .get_mut(allocation_id)
            .and_then(|chain| {
                chain
                    .iter_mut()
                    .rev()
                    .find(|e| e.marker.allocation_root == allocation_root)
            })
            .ok_or_else(|| MarkerError::NotFound(format!("{allocation_id}:{allocation_root}")))?;
        if !entry.is_redeemed() {
            entry.status = MarkerStatus::Redeemed;
            entry.redeem_txn = Some(txn_id.to_string());
        }
        Ok(entry.clone())
    }

    fn rollback(&self, allocation_id: &str, seq: u64) -> Result<(), MarkerError> {
        let mut chains = self.chains.write().map_err(|_| poisoned())?;
        let chain = chains
            .get_mut(allocation_id)
            .ok_or_else(|| MarkerError::NotFound(allocation_id.to_string()))?;
        match chain.last() {
            Some(head) if head.seq == seq => {
                chain.pop();
                Ok(())
            }
            _ => Err(MarkerError::IntegrityViolation {
                seq,
                reason: "only the head can be rolled back".into(),
            }),
        }
    }
}
