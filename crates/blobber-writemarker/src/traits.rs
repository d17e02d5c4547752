use crate::error::MarkerError;
use crate::marker::MarkerEntry;

/// Append-only storage boundary for per-allocation marker chains.
///
/// Implementations must reject an append whose sequence number is not
/// `len + 1` or whose previous root is not the current head's root.
pub trait MarkerStore: Send + Sync {
    fn append(&self, entry: MarkerEntry) -> Result<MarkerEntry, MarkerError>;

    fn head(&self, allocation_id: &str) -> Result<Option<MarkerEntry>, MarkerError>;

    fn read_all(&self, allocation_id: &str) -> Result<Vec<MarkerEntry>, MarkerError>;

    fn get_by_root(
        &self,
        allocation_id: &str,
        allocation_root: &str,
    ) -> Result<Option<MarkerEntry>, MarkerError>;

    /// Record the ledger transaction that settled the marker with
    /// `allocation_root`.
    fn set_redeemed(
        &self,
        allocation_id: &str,
        allocation_root: &str,
        txn_id: &str,
    ) -> Result<MarkerEntry, MarkerError>;

    /// Undo the append of `seq` when a later step of the same commit fails.
    /// Only the current head can be rolled back.
    fn rollback(&self, allocation_id: &str, seq: u64) -> Result<(), MarkerError>;

    fn count(&self, allocation_id: &str) -> Result<u64, MarkerError> {
        Ok(self.read_all(allocation_id)?.len() as u64)
    }
}
