use crate::error::AllocationResult;
use crate::model::Allocation;

/// Persisted allocation rows, keyed by allocation ID.
///
/// Implementations must satisfy these invariants:
/// - At most one row exists per allocation ID.
/// - `find_or_create` is atomic: concurrent callers racing on the same ID
///   all observe the same row.
/// - `update` is an atomic read-modify-write; if the closure fails, the row
///   is left untouched.
pub trait AllocationStore: Send + Sync {
    /// Read a row by ID. Returns `Ok(None)` if absent.
    fn get(&self, id: &str) -> AllocationResult<Option<Allocation>>;

    /// Insert `allocation` unless a row with its ID exists; return the
    /// persisted row either way.
    fn find_or_create(&self, allocation: Allocation) -> AllocationResult<Allocation>;

    /// Apply `apply` to the row and persist the result.
    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Allocation) -> AllocationResult<()>,
    ) -> AllocationResult<Allocation>;

    /// Number of persisted rows.
    fn count(&self) -> AllocationResult<usize>;
}
