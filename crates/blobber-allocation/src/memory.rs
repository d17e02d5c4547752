use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::chain::{ChainClient, LedgerError, Transaction};
use crate::error::{AllocationError, AllocationResult};
use crate::model::Allocation;
use crate::traits::AllocationStore;

/// In-memory, HashMap-based allocation store.
///
/// Intended for tests and embedding. A read-only store rejects every write
/// with [`AllocationError::ReadOnly`].
pub struct InMemoryAllocationStore {
    rows: RwLock<HashMap<String, Allocation>>,
    read_only: bool,
}

impl InMemoryAllocationStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            read_only: false,
        }
    }

    /// A store that refuses all writes.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::new()
        }
    }

    fn poisoned() -> AllocationError {
        AllocationError::Store("lock poisoned".into())
    }
}

impl Default for InMemoryAllocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationStore for InMemoryAllocationStore {
    fn get(&self, id: &str) -> AllocationResult<Option<Allocation>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.get(id).cloned())
    }

    fn find_or_create(&self, allocation: Allocation) -> AllocationResult<Allocation> {
        if self.read_only {
            return Err(AllocationError::ReadOnly);
        }
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        let row = rows
            .entry(allocation.id.clone())
            .or_insert(allocation);
        Ok(row.clone())
    }

    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Allocation) -> AllocationResult<()>,
    ) -> AllocationResult<Allocation> {
        if self.read_only {
            return Err(AllocationError::ReadOnly);
        }
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        let row = rows
            .get_mut(id)
            .ok_or_else(|| AllocationError::NotFound(id.to_string()))?;
        let mut next = row.clone();
        apply(&mut next)?;
        *row = next.clone();
        Ok(next)
    }

    fn count(&self) -> AllocationResult<usize> {
        Ok(self.rows.read().map_err(|_| Self::poisoned())?.len())
    }
}

impl std::fmt::Debug for InMemoryAllocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAllocationStore")
            .field("rows", &self.count().unwrap_or_default())
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Ledger client serving a fixed set of transactions.
///
/// Counts every fetch so callers can assert how often the ledger was hit,
/// and can be switched offline to exercise the unavailable path.
#[derive(Default)]
pub struct StaticChainClient {
    transactions: RwLock<HashMap<String, Transaction>>,
    fetches: AtomicUsize,
    offline: AtomicBool,
}

impl StaticChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: Transaction) {
        if let Ok(mut txns) = self.transactions.write() {
            txns.insert(transaction.hash.clone(), transaction);
        }
    }

    /// Number of `get_transaction` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for StaticChainClient {
    async fn get_transaction(&self, hash: &str) -> Result<Transaction, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("no sharder reachable".into()));
        }
        let txns = self
            .transactions
            .read()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".into()))?;
        txns.get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(hash.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlobberConnection, PriceTerms, StorageAllocation};

    fn allocation(id: &str) -> Allocation {
        let storage = StorageAllocation {
            id: id.into(),
            size: 10,
            used_size: 0,
            owner_id: "o".into(),
            owner_public_key: "pk".into(),
            payer_id: String::new(),
            payer_public_key: String::new(),
            expiration: 0,
            time_unit: 0,
            finalized: false,
            blobbers: vec![BlobberConnection {
                id: "b1".into(),
                url: String::new(),
                terms: PriceTerms::default(),
            }],
        };
        Allocation::from_ledger(id, "b1", &storage).unwrap()
    }

    #[test]
    fn find_or_create_keeps_first_row() {
        let store = InMemoryAllocationStore::new();
        let first = store.find_or_create(allocation("a")).unwrap();
        let mut other = allocation("a");
        other.total_size = 999;
        let second = store.find_or_create(other).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn update_is_all_or_nothing() {
        let store = InMemoryAllocationStore::new();
        store.find_or_create(allocation("a")).unwrap();
        let err = store
            .update("a", &mut |row| {
                row.blobber_size_used = 5;
                Err(AllocationError::Store("refused".into()))
            })
            .unwrap_err();
        assert!(matches!(err, AllocationError::Store(_)));
        assert_eq!(store.get("a").unwrap().unwrap().blobber_size_used, 0);

        let updated = store
            .update("a", &mut |row| {
                row.blobber_size_used = 5;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.blobber_size_used, 5);
        assert_eq!(store.get("a").unwrap().unwrap().blobber_size_used, 5);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = InMemoryAllocationStore::new();
        let err = store.update("missing", &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, AllocationError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let store = InMemoryAllocationStore::read_only();
        assert!(matches!(
            store.find_or_create(allocation("a")),
            Err(AllocationError::ReadOnly)
        ));
        assert!(store.get("a").unwrap().is_none());
    }

    #[tokio::test]
    async fn static_chain_counts_fetches() {
        let chain = StaticChainClient::new();
        chain.insert(Transaction::with_output("t", "c", &serde_json::json!({})).unwrap());
        assert!(chain.get_transaction("t").await.is_ok());
        assert_eq!(
            chain.get_transaction("u").await.unwrap_err(),
            LedgerError::NotFound("u".into())
        );
        chain.set_offline(true);
        assert!(matches!(
            chain.get_transaction("t").await,
            Err(LedgerError::Unavailable(_))
        ));
        assert_eq!(chain.fetch_count(), 3);
    }
}
