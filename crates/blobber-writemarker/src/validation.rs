use blobber_allocation::Allocation;
use blobber_crypto::{RootChainVerifier, SignatureScheme};
use blobber_types::EMPTY_ROOT;

use crate::marker::MarkerEntry;

/// Result of auditing one allocation's marker chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainReport {
    pub allocation_id: String,
    pub marker_count: u64,
    pub links_valid: bool,
    pub sequence_monotonic: bool,
    pub signatures_valid: bool,
    pub timestamps_monotonic: bool,
    /// The chain ends at the allocation's recorded root.
    pub head_matches_allocation: bool,
    pub violations: Vec<Violation>,
}

impl ChainReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation found in the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    BrokenLink,
    BadSignature,
    TimestampRegression,
    HeadMismatch,
}

/// Marker chain auditor.
pub struct ChainValidator;

impl ChainValidator {
    /// Check every entry of `entries` against `allocation`.
    pub fn validate(
        entries: &[MarkerEntry],
        allocation: &Allocation,
        scheme: &dyn SignatureScheme,
    ) -> ChainReport {
        let mut violations = Vec::new();
        let mut sequence_monotonic = true;
        let mut signatures_valid = true;
        let mut timestamps_monotonic = true;
        let mut links_valid = true;

        for (index, entry) in entries.iter().enumerate() {
            let expected_seq = index as u64 + 1;
            if entry.seq != expected_seq {
                sequence_monotonic = false;
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", entry.seq),
                });
            }

            let expected_prev = if index == 0 {
                EMPTY_ROOT
            } else {
                entries[index - 1].marker.allocation_root.as_str()
            };
            if entry.marker.previous_allocation_root != expected_prev {
                links_valid = false;
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::BrokenLink,
                    description: "previous root link mismatch".into(),
                });
            }

            if index > 0 && entry.marker.timestamp < entries[index - 1].marker.timestamp {
                timestamps_monotonic = false;
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::TimestampRegression,
                    description: format!(
                        "timestamp {} precedes {}",
                        entry.marker.timestamp,
                        entries[index - 1].marker.timestamp
                    ),
                });
            }

            let signed = allocation
                .signing_key_for(&entry.marker.client_id)
                .map(|key| entry.marker.verify(scheme, key).is_ok())
                .unwrap_or(false);
            if !signed {
                signatures_valid = false;
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::BadSignature,
                    description: format!(
                        "signature by {} does not verify",
                        entry.marker.client_id
                    ),
                });
            }
        }

        let head_matches_allocation = match RootChainVerifier::verify_chain(EMPTY_ROOT, entries) {
            Ok(head) => head == allocation.allocation_root,
            // Broken links were already reported individually.
            Err(_) => entries
                .last()
                .map_or(EMPTY_ROOT, |e| e.marker.allocation_root.as_str())
                == allocation.allocation_root,
        };
        if !head_matches_allocation {
            violations.push(Violation {
                seq: entries.last().map_or(0, |e| e.seq),
                kind: ViolationKind::HeadMismatch,
                description: format!(
                    "allocation records root {}, chain does not end there",
                    allocation.allocation_root
                ),
            });
        }

        ChainReport {
            allocation_id: allocation.id.clone(),
            marker_count: entries.len() as u64,
            links_valid,
            sequence_monotonic,
            signatures_valid,
            timestamps_monotonic,
            head_matches_allocation,
            violations,
        }
    }
}
