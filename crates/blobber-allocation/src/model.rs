use blobber_types::{Timestamp, EMPTY_ROOT};
use serde::{Deserialize, Serialize};

/// Read/write prices a participant agreed to for one allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTerms {
    pub read_price: i64,
    pub write_price: i64,
}

/// A participating storage node as listed in the allocation transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobberConnection {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub terms: PriceTerms,
}

/// The decoded output of an allocation-creating ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAllocation {
    pub id: String,
    pub size: i64,
    #[serde(default)]
    pub used_size: i64,
    pub owner_id: String,
    pub owner_public_key: String,
    #[serde(default)]
    pub payer_id: String,
    #[serde(default)]
    pub payer_public_key: String,
    #[serde(rename = "expiration_date")]
    pub expiration: Timestamp,
    #[serde(default)]
    pub time_unit: i64,
    #[serde(default)]
    pub finalized: bool,
    pub blobbers: Vec<BlobberConnection>,
}

/// This node's price terms for one allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    pub id: i64,
    pub blobber_id: String,
    pub allocation_id: String,
    pub read_price: i64,
    pub write_price: i64,
}

/// A verified allocation as persisted by this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub tx: String,
    pub total_size: i64,
    pub used_size: i64,
    pub owner_id: String,
    pub owner_public_key: String,
    pub payer_id: String,
    pub payer_public_key: String,
    /// This node's share of `total_size`.
    pub blobber_size: i64,
    pub blobber_size_used: i64,
    /// Root hash of the last committed reference tree.
    pub allocation_root: String,
    /// Root of the last write marker settled on the ledger.
    pub latest_redeemed_wm: String,
    pub is_redeem_required: bool,
    pub expiration: Timestamp,
    pub time_unit: i64,
    pub finalized: bool,
    pub cleaned_up: bool,
    pub terms: Vec<Terms>,
}

/// `ceil(total / participants)`. Zero participants or a non-positive total
/// yields no share. Exact for every `i64`, including `i64::MAX`.
pub fn blobber_share(total: i64, participants: usize) -> i64 {
    match i64::try_from(participants) {
        Ok(n) if n > 0 && total > 0 => total / n + i64::from(total % n != 0),
        _ => 0,
    }
}

impl Allocation {
    /// Build this node's view of a ledger allocation.
    ///
    /// Returns `None` if `blobber_id` is not among the participants.
    pub fn from_ledger(
        tx: &str,
        blobber_id: &str,
        storage: &StorageAllocation,
    ) -> Option<Self> {
        let me = storage.blobbers.iter().find(|b| b.id == blobber_id)?;
        Some(Self {
            id: tx.to_string(),
            tx: tx.to_string(),
            total_size: storage.size,
            used_size: storage.used_size,
            owner_id: storage.owner_id.clone(),
            owner_public_key: storage.owner_public_key.clone(),
            payer_id: storage.payer_id.clone(),
            payer_public_key: storage.payer_public_key.clone(),
            blobber_size: blobber_share(storage.size, storage.blobbers.len()),
            blobber_size_used: 0,
            allocation_root: EMPTY_ROOT.to_string(),
            latest_redeemed_wm: String::new(),
            is_redeem_required: false,
            expiration: storage.expiration,
            time_unit: storage.time_unit,
            finalized: storage.finalized,
            cleaned_up: false,
            terms: vec![Terms {
                id: 1,
                blobber_id: blobber_id.to_string(),
                allocation_id: tx.to_string(),
                read_price: me.terms.read_price,
                write_price: me.terms.write_price,
            }],
        })
    }

    /// The public key that signs on behalf of `client_id`: the owner's, or
    /// the payer's when the payer is a distinct client.
    pub fn signing_key_for(&self, client_id: &str) -> Option<&str> {
        if client_id == self.owner_id {
            Some(&self.owner_public_key)
        } else if !self.payer_id.is_empty() && client_id == self.payer_id {
            Some(&self.payer_public_key)
        } else {
            None
        }
    }

    /// Space left in this node's share.
    pub fn remaining(&self) -> i64 {
        self.blobber_size - self.blobber_size_used
    }

    /// Whether a size change of `delta` keeps usage within the share.
    pub fn fits(&self, delta: i64) -> bool {
        self.blobber_size_used + delta <= self.blobber_size
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_storage(size: i64, blobbers: &[&str]) -> StorageAllocation {
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
                    terms: PriceTerms {
                        read_price: 10,
                        write_price: 20,
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn share_rounds_up() {
        assert_eq!(blobber_share(100, 2), 50);
        assert_eq!(blobber_share(100, 3), 34);
        assert_eq!(blobber_share(1, 4), 1);
        assert_eq!(blobber_share(0, 4), 0);
        assert_eq!(blobber_share(100, 0), 0);
    }

    #[test]
    fn share_never_overflows() {
        assert_eq!(blobber_share(i64::MAX, 1), i64::MAX);
        assert_eq!(blobber_share(i64::MAX, 2), i64::MAX / 2 + 1);
        assert_eq!(blobber_share(i64::MAX - 1, 2), i64::MAX / 2);
        assert_eq!(blobber_share(-100, 2), 0);
        assert_eq!(blobber_share(i64::MIN, 3), 0);
    }

    #[test]
    fn from_ledger_sets_share_and_empty_root() {
        let alloc = Allocation::from_ledger("tx1", "b1", &sample_storage(100, &["b1", "b2"]))
            .unwrap();
        assert_eq!(alloc.blobber_size, 50);
        assert_eq!(alloc.blobber_size_used, 0);
        assert_eq!(alloc.allocation_root, EMPTY_ROOT);
        assert_eq!(alloc.terms.len(), 1);
        assert_eq!(alloc.terms[0].write_price, 20);
        assert_eq!(alloc.terms[0].allocation_id, "tx1");
    }

    #[test]
    fn from_ledger_rejects_non_participant() {
        assert!(Allocation::from_ledger("tx1", "b9", &sample_storage(100, &["b1"])).is_none());
    }

    #[test]
    fn signing_key_selects_owner_or_payer() {
        let mut storage = sample_storage(100, &["b1"]);
        storage.payer_id = "payer".into();
        storage.payer_public_key = "payer-pk".into();
        let alloc = Allocation::from_ledger("tx1", "b1", &storage).unwrap();
        assert_eq!(alloc.signing_key_for("owner"), Some("owner-pk"));
        assert_eq!(alloc.signing_key_for("payer"), Some("payer-pk"));
        assert_eq!(alloc.signing_key_for("stranger"), None);
    }

    #[test]
    fn empty_payer_never_matches() {
        let alloc = Allocation::from_ledger("tx1", "b1", &sample_storage(100, &["b1"])).unwrap();
        assert_eq!(alloc.signing_key_for(""), None);
    }

    #[test]
    fn quota_arithmetic() {
        let mut alloc =
            Allocation::from_ledger("tx1", "b1", &sample_storage(100, &["b1", "b2"])).unwrap();
        alloc.blobber_size_used = 40;
        assert_eq!(alloc.remaining(), 10);
        assert!(alloc.fits(10));
        assert!(!alloc.fits(11));
        assert!(alloc.fits(-40));
    }

    #[test]
    fn storage_allocation_decodes_with_defaults() {
        let json = r#"{
            "id": "tx1", "size": 100, "owner_id": "o", "owner_public_key": "pk",
            "expiration_date": 5, "blobbers": [{"id": "b1"}]
        }"#;
        let decoded: StorageAllocation = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.used_size, 0);
        assert_eq!(decoded.payer_id, "");
        assert_eq!(decoded.blobbers[0].terms, PriceTerms::default());
    }
}
