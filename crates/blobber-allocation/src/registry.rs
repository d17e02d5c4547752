use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::{ChainClient, LedgerError};
use crate::error::{AllocationError, AllocationResult};
use crate::model::{Allocation, StorageAllocation};
use crate::traits::AllocationStore;

/// Verify-then-cache front door for allocations.
///
/// Holds this node's identity explicitly; nothing is read from process
/// globals.
pub struct AllocationRegistry {
    blobber_id: String,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn AllocationStore>,
}

impl AllocationRegistry {
    pub fn new(
        blobber_id: impl Into<String>,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn AllocationStore>,
    ) -> Self {
        Self {
            blobber_id: blobber_id.into(),
            chain,
            store,
        }
    }

    pub fn blobber_id(&self) -> &str {
        &self.blobber_id
    }

    pub fn store(&self) -> &Arc<dyn AllocationStore> {
        &self.store
    }

    /// Return the allocation, fetching and persisting it from the ledger on
    /// first sight.
    ///
    /// With `readonly` set the verified allocation is returned without being
    /// persisted, so the next call consults the ledger again.
    pub async fn verify_allocation(
        &self,
        allocation_id: &str,
        readonly: bool,
    ) -> AllocationResult<Allocation> {
        if let Some(existing) = self.store.get(allocation_id)? {
            debug!(allocation = %allocation_id, "allocation already verified");
            return Ok(existing);
        }

        let txn = self
            .chain
            .get_transaction(allocation_id)
            .await
            .map_err(|e| match e {
                LedgerError::NotFound(reason) => AllocationError::InvalidAllocation {
                    id: allocation_id.to_string(),
                    reason: format!("not found on the ledger: {reason}"),
                },
                LedgerError::Unavailable(reason) => AllocationError::LedgerUnavailable(reason),
            })?;

        let storage: StorageAllocation =
            serde_json::from_str(&txn.transaction_output).map_err(|e| {
                AllocationError::OutputDecode {
                    id: allocation_id.to_string(),
                    reason: e.to_string(),
                }
            })?;
        if storage.size < 0 || storage.used_size < 0 {
            warn!(
                allocation = %allocation_id,
                size = storage.size,
                used = storage.used_size,
                "ledger reports a negative allocation size"
            );
            return Err(AllocationError::InvalidAllocation {
                id: allocation_id.to_string(),
                reason: format!("negative size {} (used {})", storage.size, storage.used_size),
            });
        }

        let allocation = Allocation::from_ledger(allocation_id, &self.blobber_id, &storage)
            .ok_or_else(|| {
                warn!(
                    allocation = %allocation_id,
                    blobber = %self.blobber_id,
                    "blobber is not a participant of the allocation"
                );
                AllocationError::InvalidBlobber {
                    allocation_id: allocation_id.to_string(),
                    blobber_id: self.blobber_id.clone(),
                }
            })?;

        if readonly {
            return Ok(allocation);
        }

        info!(
            allocation = %allocation_id,
            share = allocation.blobber_size,
            participants = storage.blobbers.len(),
            "saving allocation verified on the ledger"
        );
        self.store
            .find_or_create(allocation)
            .map_err(|e| AllocationError::AllocationWrite {
                id: allocation_id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Local row only; never consults the ledger.
    pub fn get(&self, allocation_id: &str) -> AllocationResult<Allocation> {
        self.store
            .get(allocation_id)?
            .ok_or_else(|| AllocationError::NotFound(allocation_id.to_string()))
    }

    /// Atomic read-modify-write of a persisted allocation.
    pub fn update<F>(&self, allocation_id: &str, mut apply: F) -> AllocationResult<Allocation>
    where
        F: FnMut(&mut Allocation) -> AllocationResult<()>,
    {
        self.store.update(allocation_id, &mut apply)
    }
}

impl std::fmt::Debug for AllocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationRegistry")
            .field("blobber_id", &self.blobber_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Transaction;
    use crate::memory::{InMemoryAllocationStore, StaticChainClient};
    use crate::model::{BlobberConnection, PriceTerms};
    use blobber_types::EMPTY_ROOT;

    fn storage(size: i64, blobbers: &[&str]) -> StorageAllocation {
        StorageAllocation {
            id: "tx1".into(),
            size,
            used_size: 0,
            owner_id: "owner".into(),
            owner_public_key: "owner-pk".into(),
            payer_id: String::new(),
            payer_public_key: String::new(),
            expiration: 2_000_000_000,
            time_unit: 3600,
            finalized: false,
            blobbers: blobbers
                .iter()
                .map(|id| BlobberConnection {
                    id: id.to_string(),
                    url: String::new(),
                    terms: PriceTerms::default(),
                })
                .collect(),
        }
    }

    fn setup(
        node: &str,
        output: &StorageAllocation,
    ) -> (AllocationRegistry, Arc<StaticChainClient>, Arc<InMemoryAllocationStore>) {
        let chain = Arc::new(StaticChainClient::new());
        chain.insert(Transaction::with_output("tx1", "owner", output).unwrap());
        let store = Arc::new(InMemoryAllocationStore::new());
        let registry = AllocationRegistry::new(node, chain.clone(), store.clone());
        (registry, chain, store)
    }

    #[tokio::test]
    async fn verifies_then_serves_from_store() {
        let (registry, chain, store) = setup("b1", &storage(100, &["b1", "b2"]));

        let first = registry.verify_allocation("tx1", false).await.unwrap();
        assert_eq!(first.blobber_size, 50);
        assert_eq!(first.blobber_size_used, 0);
        assert_eq!(first.allocation_root, EMPTY_ROOT);
        assert_eq!(store.count().unwrap(), 1);

        let second = registry.verify_allocation("tx1", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.fetch_count(), 1);
    }

    #[tokio::test]
    async fn readonly_does_not_persist() {
        let (registry, chain, store) = setup("b1", &storage(100, &["b1"]));
        let alloc = registry.verify_allocation("tx1", true).await.unwrap();
        assert_eq!(alloc.blobber_size, 100);
        assert_eq!(store.count().unwrap(), 0);

        registry.verify_allocation("tx1", true).await.unwrap();
        assert_eq!(chain.fetch_count(), 2);
    }

    #[tokio::test]
    async fn unknown_transaction_is_invalid_allocation() {
        let (registry, _, store) = setup("b1", &storage(100, &["b1"]));
        let err = registry.verify_allocation("nope", false).await.unwrap_err();
        assert!(matches!(err, AllocationError::InvalidAllocation { .. }));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn negative_size_is_invalid_allocation() {
        let (registry, chain, store) = setup("b1", &storage(-100, &["b1"]));
        let err = registry.verify_allocation("tx1", false).await.unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidAllocation { ref reason, .. } if reason.contains("negative")
        ));
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(chain.fetch_count(), 1);
    }

    #[tokio::test]
    async fn maximal_size_gets_exact_share() {
        let (registry, _, _) = setup("b1", &storage(i64::MAX, &["b1", "b2"]));
        let alloc = registry.verify_allocation("tx1", false).await.unwrap();
        assert_eq!(alloc.blobber_size, i64::MAX / 2 + 1);
    }

    #[tokio::test]
    async fn undecodable_output_is_distinct_error() {
        let chain = Arc::new(StaticChainClient::new());
        chain.insert(Transaction {
            hash: "tx1".into(),
            client_id: "owner".into(),
            transaction_output: "not json".into(),
            creation_date: 0,
        });
        let registry =
            AllocationRegistry::new("b1", chain, Arc::new(InMemoryAllocationStore::new()));
        let err = registry.verify_allocation("tx1", false).await.unwrap_err();
        assert!(matches!(err, AllocationError::OutputDecode { .. }));
    }

    #[tokio::test]
    async fn non_participant_is_invalid_blobber() {
        let (registry, _, store) = setup("b9", &storage(100, &["b1", "b2"]));
        let err = registry.verify_allocation("tx1", false).await.unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidBlobber { ref blobber_id, .. } if blobber_id == "b9"
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_ledger_is_retryable() {
        let (registry, chain, _) = setup("b1", &storage(100, &["b1"]));
        chain.set_offline(true);
        let err = registry.verify_allocation("tx1", false).await.unwrap_err();
        assert!(matches!(err, AllocationError::LedgerUnavailable(_)));

        chain.set_offline(false);
        assert!(registry.verify_allocation("tx1", false).await.is_ok());
    }

    #[tokio::test]
    async fn store_failure_is_allocation_write_error() {
        let chain = Arc::new(StaticChainClient::new());
        chain.insert(Transaction::with_output("tx1", "owner", &storage(100, &["b1"])).unwrap());
        let registry =
            AllocationRegistry::new("b1", chain, Arc::new(InMemoryAllocationStore::read_only()));
        let err = registry.verify_allocation("tx1", false).await.unwrap_err();
        assert!(matches!(err, AllocationError::AllocationWrite { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_verification_converges() {
        let (registry, _, store) = setup("b1", &storage(100, &["b1", "b2"]));
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.verify_allocation("tx1", false).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn get_and_update_are_local() {
        let (registry, chain, _) = setup("b1", &storage(100, &["b1"]));
        assert!(matches!(registry.get("tx1"), Err(AllocationError::NotFound(_))));
        registry.verify_allocation("tx1", false).await.unwrap();

        let updated = registry
            .update("tx1", |a| {
                a.blobber_size_used += 7;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.blobber_size_used, 7);
        assert_eq!(registry.get("tx1").unwrap().blobber_size_used, 7);
        assert_eq!(chain.fetch_count(), 1);
    }
}
