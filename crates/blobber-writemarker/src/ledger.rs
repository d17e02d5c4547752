//! Per-allocation write scope and atomic commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use blobber_allocation::{Allocation, AllocationError, AllocationStore};
use blobber_crypto::SignatureScheme;
use blobber_reference::{RefError, RefTree, RefTreeStore, TreeMutation};
use tracing::{error, info, warn};

use crate::error::{MarkerError, MarkerResult};
use crate::marker::{MarkerEntry, MarkerStatus, WriteMarker};
use crate::traits::MarkerStore;
use crate::validation::{ChainReport, ChainValidator};

/// Where an allocation's write scope currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopePhase {
    Idle,
    /// A marker passed validation and awaits its mutation.
    Proposed(WriteMarker),
    /// The scope committed a marker.
    Committed(u64),
}

#[derive(Debug)]
struct ScopeState {
    phase: ScopePhase,
}

/// Signed, root-chained write-marker log over all allocations on this node.
///
/// Mutations of one allocation are serialized by a per-allocation mutex
/// held for the duration of [`with_write_scope`](Self::with_write_scope);
/// distinct allocations proceed in parallel. Readers load committed tree
/// snapshots from the [`RefTreeStore`] and never take the scope.
pub struct WriteMarkerLedger {
    blobber_id: String,
    allocations: Arc<dyn AllocationStore>,
    trees: Arc<dyn RefTreeStore>,
    markers: Arc<dyn MarkerStore>,
    scheme: Arc<dyn SignatureScheme>,
    scopes: Mutex<HashMap<String, Arc<Mutex<ScopeState>>>>,
}

impl WriteMarkerLedger {
    pub fn new(
        blobber_id: impl Into<String>,
        allocations: Arc<dyn AllocationStore>,
        trees: Arc<dyn RefTreeStore>,
        markers: Arc<dyn MarkerStore>,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Self {
        Self {
            blobber_id: blobber_id.into(),
            allocations,
            trees,
            markers,
            scheme,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn blobber_id(&self) -> &str {
        &self.blobber_id
    }

    /// Run `f` with exclusive write access to `allocation_id`.
    pub fn with_write_scope<R, F>(&self, allocation_id: &str, f: F) -> MarkerResult<R>
    where
        F: FnOnce(&mut WriteScope<'_>) -> MarkerResult<R>,
    {
        let slot = self.scope_slot(allocation_id)?;
        // A panic inside a previous scope leaves nothing half-published, so
        // the state is safe to reuse.
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.phase = ScopePhase::Idle;
        let mut scope = WriteScope {
            ledger: self,
            allocation_id: allocation_id.to_string(),
            state: &mut guard,
        };
        f(&mut scope)
    }

    /// Validate `marker` against the current head without committing.
    pub fn propose(&self, marker: &WriteMarker) -> MarkerResult<()> {
        self.with_write_scope(&marker.allocation_id, |scope| scope.propose(marker))
    }

    /// Validate `marker`, apply `mutation`, and commit both atomically.
    pub fn commit(&self, marker: &WriteMarker, mutation: &TreeMutation) -> MarkerResult<MarkerEntry> {
        self.with_write_scope(&marker.allocation_id, |scope| scope.commit(marker, mutation))
    }

    /// Open the scope, propose, and commit in one step.
    pub fn commit_write(
        &self,
        marker: &WriteMarker,
        mutation: &TreeMutation,
    ) -> MarkerResult<MarkerEntry> {
        self.with_write_scope(&marker.allocation_id, |scope| {
            scope.propose(marker)?;
            scope.commit(marker, mutation)
        })
    }

    /// Record that the marker with `allocation_root` was settled by `txn_id`.
    pub fn mark_redeemed(
        &self,
        allocation_id: &str,
        allocation_root: &str,
        txn_id: &str,
    ) -> MarkerResult<MarkerEntry> {
        self.with_write_scope(allocation_id, |_| {
            let entry = self
                .markers
                .set_redeemed(allocation_id, allocation_root, txn_id)?;
            self.allocations.update(allocation_id, &mut |a| {
                a.latest_redeemed_wm = allocation_root.to_string();
                a.is_redeem_required = a.allocation_root != allocation_root;
                Ok(())
            })?;
            info!(
                allocation = %allocation_id,
                root = %allocation_root,
                txn = %txn_id,
                "write marker redeemed"
            );
            Ok(entry)
        })
    }

    /// The full committed chain, oldest first.
    pub fn chain(&self, allocation_id: &str) -> MarkerResult<Vec<MarkerEntry>> {
        self.markers.read_all(allocation_id)
    }

    pub fn head(&self, allocation_id: &str) -> MarkerResult<Option<MarkerEntry>> {
        self.markers.head(allocation_id)
    }

    /// Markers committed but not yet redeemed, oldest first.
    pub fn pending_redemption(&self, allocation_id: &str) -> MarkerResult<Vec<MarkerEntry>> {
        Ok(self
            .markers
            .read_all(allocation_id)?
            .into_iter()
            .filter(|e| e.status == MarkerStatus::Committed)
            .collect())
    }

    /// Audit the stored chain: links, sequence, signatures, timestamps, head.
    pub fn verify_chain(&self, allocation_id: &str) -> MarkerResult<ChainReport> {
        let allocation = self.allocation(allocation_id)?;
        let entries = self.markers.read_all(allocation_id)?;
        Ok(ChainValidator::validate(&entries, &allocation, self.scheme.as_ref()))
    }

    fn scope_slot(&self, allocation_id: &str) -> MarkerResult<Arc<Mutex<ScopeState>>> {
        let mut scopes = self
            .scopes
            .lock()
            .map_err(|_| MarkerError::Store("scope table lock poisoned".into()))?;
        Ok(scopes
            .entry(allocation_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ScopeState {
                    phase: ScopePhase::Idle,
                }))
            })
            .clone())
    }

    fn allocation(&self, allocation_id: &str) -> MarkerResult<Allocation> {
        self.allocations
            .get(allocation_id)?
            .ok_or_else(|| AllocationError::NotFound(allocation_id.to_string()).into())
    }

    /// Check `marker` against the allocation's current state.
    fn validate(&self, marker: &WriteMarker, allocation: &Allocation) -> MarkerResult<()> {
        if marker.allocation_id != allocation.id {
            return Err(self.reject(
                marker,
                MarkerError::InvalidMarker(format!(
                    "marker names allocation {}, scope is {}",
                    marker.allocation_id, allocation.id
                )),
            ));
        }
        if marker.blobber_id != self.blobber_id {
            return Err(self.reject(
                marker,
                MarkerError::InvalidMarker(format!(
                    "marker names blobber {}, this node is {}",
                    marker.blobber_id, self.blobber_id
                )),
            ));
        }

        if marker.previous_allocation_root != allocation.allocation_root {
            return Err(self.reject(
                marker,
                MarkerError::StaleRoot {
                    current: allocation.allocation_root.clone(),
                    previous: marker.previous_allocation_root.clone(),
                },
            ));
        }

        let key = allocation.signing_key_for(&marker.client_id).ok_or_else(|| {
            self.reject(
                marker,
                MarkerError::InvalidSignature(format!(
                    "client {} is neither owner nor payer",
                    marker.client_id
                )),
            )
        })?;
        marker
            .verify(self.scheme.as_ref(), key)
            .map_err(|e| self.reject(marker, MarkerError::InvalidSignature(e.to_string())))?;

        if let Some(head) = self.markers.head(&allocation.id)? {
            if marker.timestamp < head.marker.timestamp {
                return Err(self.reject(
                    marker,
                    MarkerError::OutOfOrder {
                        last: head.marker.timestamp,
                        timestamp: marker.timestamp,
                    },
                ));
            }
        }
        Ok(())
    }

    fn reject(&self, marker: &WriteMarker, err: MarkerError) -> MarkerError {
        warn!(
            allocation = %marker.allocation_id,
            client = %marker.client_id,
            root = %marker.allocation_root,
            error = %err,
            "write marker rejected"
        );
        err
    }

    /// Compensate a commit that failed after appending marker `seq`. The
    /// marker is popped first so the chain head never names an unpublished
    /// root; then the allocation row is put back to `before` if the commit
    /// already updated it. Each step runs even if the other fails.
    fn undo_commit(&self, before: &Allocation, seq: u64, restore_allocation: bool) {
        if let Err(e) = self.markers.rollback(&before.id, seq) {
            error!(
                allocation = %before.id,
                seq,
                error = %e,
                "failed to roll back write marker"
            );
        }
        if !restore_allocation {
            return;
        }
        let restored = self.allocations.update(&before.id, &mut |a| {
            *a = before.clone();
            Ok(())
        });
        if let Err(e) = restored {
            error!(
                allocation = %before.id,
                root = %before.allocation_root,
                error = %e,
                "failed to restore allocation after aborted commit"
            );
        }
    }
}

impl std::fmt::Debug for WriteMarkerLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteMarkerLedger")
            .field("blobber_id", &self.blobber_id)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to one allocation.
pub struct WriteScope<'a> {
    ledger: &'a WriteMarkerLedger,
    allocation_id: String,
    state: &'a mut ScopeState,
}

impl WriteScope<'_> {
    pub fn allocation_id(&self) -> &str {
        &self.allocation_id
    }

    pub fn phase(&self) -> &ScopePhase {
        &self.state.phase
    }

    pub fn allocation(&self) -> MarkerResult<Allocation> {
        self.ledger.allocation(&self.allocation_id)
    }

    /// The committed tree snapshot.
    pub fn tree(&self) -> MarkerResult<Arc<RefTree>> {
        Ok(self.ledger.trees.load(&self.allocation_id)?)
    }

    /// Validate `marker` and remember it for the following commit.
    pub fn propose(&mut self, marker: &WriteMarker) -> MarkerResult<()> {
        self.check_scope(marker)?;
        let allocation = self.allocation()?;
        self.ledger.validate(marker, &allocation)?;
        self.state.phase = ScopePhase::Proposed(marker.clone());
        Ok(())
    }

    /// Re-validate `marker`, apply `mutation` to a private copy of the
    /// committed tree, and publish everything only if the result hashes to
    /// the signed root, matches the signed size, and fits the quota.
    pub fn commit(
        &mut self,
        marker: &WriteMarker,
        mutation: &TreeMutation,
    ) -> MarkerResult<MarkerEntry> {
        self.check_scope(marker)?;
        if let ScopePhase::Proposed(proposed) = &self.state.phase {
            if proposed != marker {
                return Err(self.ledger.reject(
                    marker,
                    MarkerError::InvalidMarker("commit does not match the proposed marker".into()),
                ));
            }
        }

        let ledger = self.ledger;
        let allocation = self.allocation()?;
        ledger.validate(marker, &allocation)?;

        let base = self.tree()?;
        let mut next = (*base).clone();
        mutation.apply(&mut next)?;

        let computed = next.root_hash();
        if computed != marker.allocation_root {
            return Err(ledger.reject(
                marker,
                MarkerError::RootMismatch {
                    expected: marker.allocation_root.clone(),
                    computed,
                },
            ));
        }
        let delta = next.total_size() - base.total_size();
        if delta != marker.size {
            return Err(ledger.reject(
                marker,
                MarkerError::SizeMismatch {
                    declared: marker.size,
                    actual: delta,
                },
            ));
        }
        if !allocation.fits(delta) {
            return Err(ledger.reject(
                marker,
                MarkerError::QuotaExceeded {
                    allocation_id: allocation.id.clone(),
                    used: allocation.blobber_size_used,
                    delta,
                    share: allocation.blobber_size,
                },
            ));
        }

        let seq = ledger
            .markers
            .head(&allocation.id)?
            .map_or(1, |head| head.seq + 1);
        let entry = ledger.markers.append(MarkerEntry {
            marker: marker.clone(),
            seq,
            status: MarkerStatus::Committed,
            redeem_txn: None,
        })?;

        let updated = ledger.allocations.update(&allocation.id, &mut |a| {
            a.blobber_size_used += delta;
            a.used_size += delta;
            a.allocation_root = computed.clone();
            a.is_redeem_required = true;
            Ok(())
        });
        if let Err(e) = updated {
            ledger.undo_commit(&allocation, seq, false);
            return Err(e.into());
        }

        if let Err(e) = ledger.trees.store(next) {
            ledger.undo_commit(&allocation, seq, true);
            return Err(e.into());
        }

        info!(
            allocation = %allocation.id,
            seq,
            root = %computed,
            size = delta,
            "write marker committed"
        );
        self.state.phase = ScopePhase::Committed(seq);
        Ok(entry)
    }

    /// Apply a metadata-only edit (collaborators, stats, commit log) to the
    /// committed tree. Edits that would change the root are refused; those
    /// need a write marker.
    pub fn update_metadata<R, F>(&mut self, edit: F) -> MarkerResult<R>
    where
        F: FnOnce(&mut RefTree) -> Result<R, RefError>,
    {
        let base = self.tree()?;
        let mut next = (*base).clone();
        let out = edit(&mut next)?;
        let computed = next.root_hash();
        if computed != base.root_hash() {
            return Err(MarkerError::RootMismatch {
                expected: base.root_hash(),
                computed,
            });
        }
        self.ledger.trees.store(next)?;
        Ok(out)
    }

    fn check_scope(&self, marker: &WriteMarker) -> MarkerResult<()> {
        if marker.allocation_id != self.allocation_id {
            return Err(self.ledger.reject(
                marker,
                MarkerError::InvalidMarker(format!(
                    "marker names allocation {}, scope is {}",
                    marker.allocation_id, self.allocation_id
                )),
            ));
        }
        Ok(())
    }
}
