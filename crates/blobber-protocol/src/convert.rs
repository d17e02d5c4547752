//! Translation between entities and wire messages.
//!
//! Every `to_wire_*` is total and every `from_wire_*` inverts it exactly:
//! `from_wire(to_wire(x)) == x`, and `None` maps to `None` both ways.
//! Record timestamps travel as signed Unix nanoseconds. Decoding a ref or a
//! proof can still fail on input no encoder produces (an unknown type tag, a
//! missing meta, an unparseable path).

use std::collections::HashSet;

use blobber_allocation::{Allocation, Terms};
use blobber_proof::{ChildHash, ObjectPath, PathLink, PathNode, ReferencePath, MAX_RECURSION_DEPTH};
use blobber_reference::{
    Collaborator, CommitMetaTxn, FileMeta, FileStats, Ref, RefKind, DIRECTORY, FILE,
};
use blobber_types::{from_unix_nanos, to_unix_nanos, AllocationPath};
use blobber_writemarker::WriteMarker;
use tracing::warn;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{
    WireAllocation, WireChildHash, WireCollaborator, WireCommitMetaTxn, WireDirMeta,
    WireFileMeta, WireFileRef, WireFileStats, WireObjectPath, WirePathLink, WireRefNode,
    WireReferencePath, WireTerm, WireWriteMarker,
};

pub fn to_wire_allocation(alloc: Option<&Allocation>) -> Option<WireAllocation> {
    let alloc = alloc?;
    Some(WireAllocation {
        id: alloc.id.clone(),
        tx: alloc.tx.clone(),
        total_size: alloc.total_size,
        used_size: alloc.used_size,
        owner_id: alloc.owner_id.clone(),
        owner_public_key: alloc.owner_public_key.clone(),
        payer_id: alloc.payer_id.clone(),
        payer_public_key: alloc.payer_public_key.clone(),
        blobber_size: alloc.blobber_size,
        blobber_size_used: alloc.blobber_size_used,
        allocation_root: alloc.allocation_root.clone(),
        latest_redeemed_wm: alloc.latest_redeemed_wm.clone(),
        is_redeem_required: alloc.is_redeem_required,
        expiration: alloc.expiration,
        time_unit: alloc.time_unit,
        finalized: alloc.finalized,
        cleaned_up: alloc.cleaned_up,
        terms: alloc
            .terms
            .iter()
            .map(|t| WireTerm {
                id: t.id,
                blobber_id: t.blobber_id.clone(),
                allocation_id: t.allocation_id.clone(),
                read_price: t.read_price,
                write_price: t.write_price,
            })
            .collect(),
    })
}

pub fn from_wire_allocation(wire: Option<&WireAllocation>) -> Option<Allocation> {
    let wire = wire?;
    Some(Allocation {
        id: wire.id.clone(),
        tx: wire.tx.clone(),
        total_size: wire.total_size,
        used_size: wire.used_size,
        owner_id: wire.owner_id.clone(),
        owner_public_key: wire.owner_public_key.clone(),
        payer_id: wire.payer_id.clone(),
        payer_public_key: wire.payer_public_key.clone(),
        blobber_size: wire.blobber_size,
        blobber_size_used: wire.blobber_size_used,
        allocation_root: wire.allocation_root.clone(),
        latest_redeemed_wm: wire.latest_redeemed_wm.clone(),
        is_redeem_required: wire.is_redeem_required,
        expiration: wire.expiration,
        time_unit: wire.time_unit,
        finalized: wire.finalized,
        cleaned_up: wire.cleaned_up,
        terms: wire
            .terms
            .iter()
            .map(|t| Terms {
                id: t.id,
                blobber_id: t.blobber_id.clone(),
                allocation_id: t.allocation_id.clone(),
                read_price: t.read_price,
                write_price: t.write_price,
            })
            .collect(),
    })
}

fn to_wire_txns(txns: &[CommitMetaTxn]) -> Vec<WireCommitMetaTxn> {
    txns.iter()
        .map(|c| WireCommitMetaTxn {
            ref_id: c.ref_id,
            txn_id: c.txn_id.clone(),
            created_at: to_unix_nanos(&c.created_at),
        })
        .collect()
}

fn from_wire_txns(txns: &[WireCommitMetaTxn]) -> Vec<CommitMetaTxn> {
    txns.iter()
        .map(|c| CommitMetaTxn {
            ref_id: c.ref_id,
            txn_id: c.txn_id.clone(),
            created_at: from_unix_nanos(c.created_at),
        })
        .collect()
}

/// The ref's type tag selects which meta is populated; the other is `None`.
pub fn to_wire_ref(r: Option<&Ref>) -> Option<WireFileRef> {
    let r = r?;
    let (file_meta, dir_meta) = match &r.kind {
        RefKind::File(meta) => (Some(file_meta_to_wire(r, meta)), None),
        RefKind::Directory => (None, Some(dir_meta_to_wire(r))),
    };
    Some(WireFileRef {
        ref_type: r.type_tag().to_string(),
        file_meta,
        dir_meta,
    })
}

fn file_meta_to_wire(r: &Ref, meta: &FileMeta) -> WireFileMeta {
    WireFileMeta {
        id: r.id,
        allocation_id: r.allocation_id.clone(),
        ref_type: FILE.to_string(),
        lookup_hash: r.lookup_hash.clone(),
        name: r.name.clone(),
        path: r.path.to_string(),
        hash: r.hash.clone(),
        num_blocks: r.num_blocks,
        path_hash: r.path_hash.clone(),
        custom_meta: r.custom_meta.clone(),
        content_hash: meta.content_hash.clone(),
        size: r.size,
        merkle_root: meta.merkle_root.clone(),
        actual_file_size: meta.actual_file_size,
        actual_file_hash: meta.actual_file_hash.clone(),
        mimetype: meta.mimetype.clone(),
        thumbnail_size: meta.thumbnail_size,
        thumbnail_hash: meta.thumbnail_hash.clone(),
        actual_thumbnail_size: meta.actual_thumbnail_size,
        actual_thumbnail_hash: meta.actual_thumbnail_hash.clone(),
        encrypted_key: meta.encrypted_key.clone(),
        attributes: meta.attributes.clone(),
        on_cloud: meta.on_cloud,
        commit_meta_txns: to_wire_txns(&r.commit_meta_txns),
        created_at: to_unix_nanos(&r.created_at),
        updated_at: to_unix_nanos(&r.updated_at),
    }
}

fn dir_meta_to_wire(r: &Ref) -> WireDirMeta {
    WireDirMeta {
        id: r.id,
        allocation_id: r.allocation_id.clone(),
        ref_type: DIRECTORY.to_string(),
        lookup_hash: r.lookup_hash.clone(),
        name: r.name.clone(),
        path: r.path.to_string(),
        hash: r.hash.clone(),
        num_blocks: r.num_blocks,
        path_hash: r.path_hash.clone(),
        size: r.size,
        custom_meta: r.custom_meta.clone(),
        commit_meta_txns: to_wire_txns(&r.commit_meta_txns),
        created_at: to_unix_nanos(&r.created_at),
        updated_at: to_unix_nanos(&r.updated_at),
    }
}

fn parse_path(path: &str) -> ProtocolResult<AllocationPath> {
    AllocationPath::parse(path).map_err(|e| ProtocolError::InvalidField {
        field: "path",
        reason: e.to_string(),
    })
}

fn missing(field: &'static str) -> ProtocolError {
    ProtocolError::InvalidField {
        field,
        reason: "missing".into(),
    }
}

pub fn from_wire_ref(wire: Option<&WireFileRef>) -> ProtocolResult<Option<Ref>> {
    let Some(wire) = wire else {
        return Ok(None);
    };
    let r = match wire.ref_type.as_str() {
        FILE => {
            let m = wire.file_meta.as_ref().ok_or_else(|| missing("file_meta"))?;
            Ref {
                id: m.id,
                allocation_id: m.allocation_id.clone(),
                name: m.name.clone(),
                path: parse_path(&m.path)?,
                path_hash: m.path_hash.clone(),
                lookup_hash: m.lookup_hash.clone(),
                hash: m.hash.clone(),
                size: m.size,
                num_blocks: m.num_blocks,
                custom_meta: m.custom_meta.clone(),
                commit_meta_txns: from_wire_txns(&m.commit_meta_txns),
                created_at: from_unix_nanos(m.created_at),
                updated_at: from_unix_nanos(m.updated_at),
                kind: RefKind::File(FileMeta {
                    content_hash: m.content_hash.clone(),
                    merkle_root: m.merkle_root.clone(),
                    actual_file_size: m.actual_file_size,
                    actual_file_hash: m.actual_file_hash.clone(),
                    mimetype: m.mimetype.clone(),
                    thumbnail_size: m.thumbnail_size,
                    thumbnail_hash: m.thumbnail_hash.clone(),
                    actual_thumbnail_size: m.actual_thumbnail_size,
                    actual_thumbnail_hash: m.actual_thumbnail_hash.clone(),
                    encrypted_key: m.encrypted_key.clone(),
                    attributes: m.attributes.clone(),
                    on_cloud: m.on_cloud,
                }),
            }
        }
        DIRECTORY => {
            let m = wire.dir_meta.as_ref().ok_or_else(|| missing("dir_meta"))?;
            Ref {
                id: m.id,
                allocation_id: m.allocation_id.clone(),
                name: m.name.clone(),
                path: parse_path(&m.path)?,
                path_hash: m.path_hash.clone(),
                lookup_hash: m.lookup_hash.clone(),
                hash: m.hash.clone(),
                size: m.size,
                num_blocks: m.num_blocks,
                custom_meta: m.custom_meta.clone(),
                commit_meta_txns: from_wire_txns(&m.commit_meta_txns),
                created_at: from_unix_nanos(m.created_at),
                updated_at: from_unix_nanos(m.updated_at),
                kind: RefKind::Directory,
            }
        }
        other => return Err(ProtocolError::UnknownRefType(other.to_string())),
    };
    Ok(Some(r))
}

fn required_ref(wire: Option<&WireFileRef>, field: &'static str) -> ProtocolResult<Ref> {
    from_wire_ref(wire)?.ok_or_else(|| missing(field))
}

pub fn to_wire_file_stats(stats: Option<&FileStats>) -> Option<WireFileStats> {
    let s = stats?;
    Some(WireFileStats {
        id: s.id,
        ref_id: s.ref_id,
        num_updates: s.num_updates,
        num_block_downloads: s.num_block_downloads,
        success_challenges: s.success_challenges,
        failed_challenges: s.failed_challenges,
        last_challenge_response_txn: s.last_challenge_response_txn.clone(),
        write_marker_redeem_txn: s.write_marker_redeem_txn.clone(),
        created_at: to_unix_nanos(&s.created_at),
        updated_at: to_unix_nanos(&s.updated_at),
    })
}

pub fn from_wire_file_stats(wire: Option<&WireFileStats>) -> Option<FileStats> {
    let w = wire?;
    Some(FileStats {
        id: w.id,
        ref_id: w.ref_id,
        num_updates: w.num_updates,
        num_block_downloads: w.num_block_downloads,
        success_challenges: w.success_challenges,
        failed_challenges: w.failed_challenges,
        last_challenge_response_txn: w.last_challenge_response_txn.clone(),
        write_marker_redeem_txn: w.write_marker_redeem_txn.clone(),
        created_at: from_unix_nanos(w.created_at),
        updated_at: from_unix_nanos(w.updated_at),
    })
}

pub fn to_wire_write_marker(wm: Option<&WriteMarker>) -> Option<WireWriteMarker> {
    let wm = wm?;
    Some(WireWriteMarker {
        allocation_root: wm.allocation_root.clone(),
        previous_allocation_root: wm.previous_allocation_root.clone(),
        allocation_id: wm.allocation_id.clone(),
        size: wm.size,
        blobber_id: wm.blobber_id.clone(),
        timestamp: wm.timestamp,
        client_id: wm.client_id.clone(),
        signature: wm.signature.clone(),
    })
}

pub fn from_wire_write_marker(wire: Option<&WireWriteMarker>) -> Option<WriteMarker> {
    let wm = wire?;
    Some(WriteMarker {
        allocation_root: wm.allocation_root.clone(),
        previous_allocation_root: wm.previous_allocation_root.clone(),
        allocation_id: wm.allocation_id.clone(),
        size: wm.size,
        blobber_id: wm.blobber_id.clone(),
        timestamp: wm.timestamp,
        client_id: wm.client_id.clone(),
        signature: wm.signature.clone(),
    })
}

pub fn to_wire_collaborator(c: Option<&Collaborator>) -> Option<WireCollaborator> {
    let c = c?;
    Some(WireCollaborator {
        ref_id: c.ref_id,
        client_id: c.client_id.clone(),
        created_at: to_unix_nanos(&c.created_at),
    })
}

pub fn from_wire_collaborator(wire: Option<&WireCollaborator>) -> Option<Collaborator> {
    let c = wire?;
    Some(Collaborator {
        ref_id: c.ref_id,
        client_id: c.client_id.clone(),
        created_at: from_unix_nanos(c.created_at),
    })
}

pub fn to_wire_object_path(path: Option<&ObjectPath>) -> Option<WireObjectPath> {
    let op = path?;
    Some(WireObjectPath {
        root_hash: op.root_hash.clone(),
        block_num: op.block_num,
        file_block_num: op.file_block_num,
        meta: to_wire_ref(Some(&op.meta)),
        links: op
            .links
            .iter()
            .take(MAX_RECURSION_DEPTH)
            .map(|link| WirePathLink {
                meta: to_wire_ref(Some(&link.meta)),
                children: link
                    .children
                    .iter()
                    .map(|c| WireChildHash {
                        name: c.name.clone(),
                        hash: c.hash.clone(),
                    })
                    .collect(),
            })
            .collect(),
        truncated: op.truncated || op.links.len() > MAX_RECURSION_DEPTH,
    })
}

pub fn from_wire_object_path(wire: Option<&WireObjectPath>) -> ProtocolResult<Option<ObjectPath>> {
    let Some(wire) = wire else {
        return Ok(None);
    };
    let over_limit = wire.links.len() > MAX_RECURSION_DEPTH;
    if over_limit {
        warn!(
            links = wire.links.len(),
            max = MAX_RECURSION_DEPTH,
            "object path exceeds recursion limit, truncating"
        );
    }
    let links = wire
        .links
        .iter()
        .take(MAX_RECURSION_DEPTH)
        .map(|link| {
            Ok(PathLink {
                meta: required_ref(link.meta.as_ref(), "links.meta")?,
                children: link
                    .children
                    .iter()
                    .map(|c| ChildHash {
                        name: c.name.clone(),
                        hash: c.hash.clone(),
                    })
                    .collect(),
            })
        })
        .collect::<ProtocolResult<Vec<_>>>()?;
    Ok(Some(ObjectPath {
        root_hash: wire.root_hash.clone(),
        block_num: wire.block_num,
        file_block_num: wire.file_block_num,
        meta: required_ref(wire.meta.as_ref(), "meta")?,
        links,
        truncated: wire.truncated || over_limit,
    }))
}

/// Re-slot the part of an arena reachable from its root. A node reached a
/// second time is sent without its children and nothing below
/// [`MAX_RECURSION_DEPTH`] is expanded, so malformed arenas still terminate.
pub fn to_wire_reference_path(path: Option<&ReferencePath>) -> Option<WireReferencePath> {
    let rp = path?;
    let root = rp.root.filter(|&index| index < rp.nodes.len())?;
    let mut out = WireReferencePath {
        nodes: vec![WireRefNode {
            meta: to_wire_ref(Some(&rp.nodes[root].meta)),
            children: Vec::new(),
        }],
        root: 0,
        truncated: rp.truncated,
    };
    let mut seen = HashSet::from([root]);

    // (wire slot, arena index, depth)
    let mut stack = vec![(0usize, root, 0usize)];
    while let Some((slot, index, depth)) = stack.pop() {
        let children = &rp.nodes[index].children;
        if children.is_empty() {
            continue;
        }
        if depth >= MAX_RECURSION_DEPTH {
            warn!(index, depth, "reference path cut during encoding");
            out.truncated = true;
            continue;
        }
        for &child in children {
            let Some(node) = rp.nodes.get(child) else {
                out.truncated = true;
                continue;
            };
            let Ok(next) = u32::try_from(out.nodes.len()) else {
                out.truncated = true;
                break;
            };
            out.nodes.push(WireRefNode {
                meta: to_wire_ref(Some(&node.meta)),
                children: Vec::new(),
            });
            out.nodes[slot].children.push(next);
            if seen.insert(child) {
                stack.push((next as usize, child, depth + 1));
            } else if !node.children.is_empty() {
                warn!(index = child, "reference path node reached twice");
                out.truncated = true;
            }
        }
    }
    Some(out)
}

/// Rebuild an arena from a peer's wire path. The walk mirrors the encoder:
/// it starts at `root`, expands each wire node at most once and stops at
/// [`MAX_RECURSION_DEPTH`]. Out-of-range child indices are dropped.
pub fn from_wire_reference_path(
    wire: Option<&WireReferencePath>,
) -> ProtocolResult<Option<ReferencePath>> {
    let Some(wire) = wire else {
        return Ok(None);
    };
    let root = wire.root as usize;
    let top = wire.nodes.get(root).ok_or_else(|| ProtocolError::InvalidField {
        field: "root",
        reason: format!("{root} out of range for {} nodes", wire.nodes.len()),
    })?;
    let mut out = ReferencePath::default();
    out.nodes.push(PathNode {
        meta: required_ref(top.meta.as_ref(), "meta")?,
        children: Vec::new(),
    });
    out.root = Some(0);
    out.truncated = wire.truncated;
    let mut seen = HashSet::from([root]);
    let mut cut = false;

    let mut stack = vec![(0usize, root, 0usize)];
    while let Some((slot, index, depth)) = stack.pop() {
        let children = &wire.nodes[index].children;
        if children.is_empty() {
            continue;
        }
        if depth >= MAX_RECURSION_DEPTH {
            cut = true;
            continue;
        }
        for &child in children {
            let child = child as usize;
            let Some(node) = wire.nodes.get(child) else {
                cut = true;
                continue;
            };
            let next = out.nodes.len();
            out.nodes.push(PathNode {
                meta: required_ref(node.meta.as_ref(), "nodes.meta")?,
                children: Vec::new(),
            });
            out.nodes[slot].children.push(next);
            if seen.insert(child) {
                stack.push((next, child, depth + 1));
            } else if !node.children.is_empty() {
                cut = true;
            }
        }
    }
    if cut {
        warn!(
            nodes = wire.nodes.len(),
            "reference path exceeds recursion limit or repeats a node, truncating"
        );
        out.truncated = true;
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_allocation::{BlobberConnection, PriceTerms, StorageAllocation};
    use blobber_crypto::SigningKey;
    use blobber_reference::{FileUpdate, RefTree};
    use chrono::{TimeZone, Utc};

    use crate::{BlobberCodec, BlobberMessage};

    fn p(s: &str) -> AllocationPath {
        AllocationPath::parse(s).unwrap()
    }

    fn tree() -> RefTree {
        let mut tree = RefTree::new("alloc");
        let update = FileUpdate::from_content(b"hello")
            .with_mimetype("text/plain")
            .with_attributes(r#"{"who":"me"}"#)
            .with_custom_meta("custom");
        tree.upsert(&p("/docs/a.txt"), update).unwrap();
        tree.upsert(&p("/docs/b"), FileUpdate::from_content(b"b")).unwrap();
        tree.upsert(&p("/c"), FileUpdate::from_content(b"c")).unwrap();
        tree.add_commit_meta_txn(&p("/c"), "txn-1").unwrap();
        tree
    }

    #[test]
    fn none_maps_to_none() {
        assert!(to_wire_allocation(None).is_none());
        assert!(from_wire_allocation(None).is_none());
        assert!(to_wire_ref(None).is_none());
        assert!(from_wire_ref(None).unwrap().is_none());
        assert!(to_wire_file_stats(None).is_none());
        assert!(from_wire_file_stats(None).is_none());
        assert!(to_wire_write_marker(None).is_none());
        assert!(from_wire_write_marker(None).is_none());
        assert!(to_wire_collaborator(None).is_none());
        assert!(from_wire_collaborator(None).is_none());
        assert!(to_wire_object_path(None).is_none());
        assert!(from_wire_object_path(None).unwrap().is_none());
        assert!(to_wire_reference_path(None).is_none());
        assert!(from_wire_reference_path(None).unwrap().is_none());
    }

    #[test]
    fn allocation_roundtrip_keeps_terms() {
        let storage = StorageAllocation {
            id: "alloc".into(),
            size: 99,
            used_size: 3,
            owner_id: "owner".into(),
            owner_public_key: "opk".into(),
            payer_id: "payer".into(),
            payer_public_key: "ppk".into(),
            expiration: 1_700_000_000,
            time_unit: 3600,
            finalized: false,
            blobbers: vec![BlobberConnection {
                id: "b1".into(),
                url: "http://b1".into(),
                terms: PriceTerms {
                    read_price: 4,
                    write_price: 9,
                },
            }],
        };
        let mut alloc = Allocation::from_ledger("alloc", "b1", &storage).unwrap();
        alloc.cleaned_up = true;
        alloc.is_redeem_required = true;

        let wire = to_wire_allocation(Some(&alloc)).unwrap();
        assert_eq!(wire.terms.len(), 1);
        assert_eq!(wire.terms[0].write_price, 9);
        assert_eq!(from_wire_allocation(Some(&wire)), Some(alloc));
    }

    #[test]
    fn type_tag_selects_exactly_one_meta() {
        let tree = tree();
        let file = to_wire_ref(Some(tree.lookup_by_path(&p("/docs/a.txt")).unwrap())).unwrap();
        assert_eq!(file.ref_type, FILE);
        assert!(file.file_meta.is_some() && file.dir_meta.is_none());

        let dir = to_wire_ref(Some(tree.lookup_by_path(&p("/docs")).unwrap())).unwrap();
        assert_eq!(dir.ref_type, DIRECTORY);
        assert!(dir.file_meta.is_none() && dir.dir_meta.is_some());
    }

    #[test]
    fn every_ref_roundtrips() {
        let tree = tree();
        for r in tree.iter() {
            let back = from_wire_ref(to_wire_ref(Some(r)).as_ref()).unwrap();
            assert_eq!(back.as_ref(), Some(r), "{}", r.path);
        }
    }

    #[test]
    fn malformed_refs_are_rejected() {
        let tree = tree();
        let mut wire = to_wire_ref(Some(tree.lookup_by_path(&p("/c")).unwrap())).unwrap();

        wire.ref_type = "x".into();
        assert!(matches!(
            from_wire_ref(Some(&wire)),
            Err(ProtocolError::UnknownRefType(_))
        ));

        wire.ref_type = DIRECTORY.into();
        assert!(matches!(
            from_wire_ref(Some(&wire)),
            Err(ProtocolError::InvalidField { field: "dir_meta", .. })
        ));

        wire.ref_type = FILE.into();
        if let Some(meta) = wire.file_meta.as_mut() {
            meta.path = "relative".into();
        }
        assert!(matches!(
            from_wire_ref(Some(&wire)),
            Err(ProtocolError::InvalidField { field: "path", .. })
        ));
    }

    #[test]
    fn stats_marker_and_collaborator_roundtrip() {
        let mut tree = tree();
        tree.add_collaborator(&p("/c"), "friend").unwrap();
        tree.record_block_downloads(&p("/c"), 4).unwrap();

        let stats = tree.file_stats(&p("/c")).unwrap();
        let wire = to_wire_file_stats(Some(stats));
        assert_eq!(from_wire_file_stats(wire.as_ref()).as_ref(), Some(stats));

        let collaborator = &tree.collaborators(&p("/c")).unwrap()[0];
        let wire = to_wire_collaborator(Some(collaborator));
        assert_eq!(from_wire_collaborator(wire.as_ref()).as_ref(), Some(collaborator));

        let marker = WriteMarker {
            allocation_root: tree.root_hash(),
            previous_allocation_root: "0".repeat(64),
            allocation_id: "alloc".into(),
            size: -7,
            blobber_id: "b1".into(),
            timestamp: 1_700_000_000,
            client_id: "owner".into(),
            signature: String::new(),
        }
        .signed(&SigningKey::from_bytes([5; 32]));
        let wire = to_wire_write_marker(Some(&marker));
        assert_eq!(from_wire_write_marker(wire.as_ref()), Some(marker));
    }

    #[test]
    fn timestamps_travel_as_nanos() {
        let at = Utc.timestamp_nanos(1_700_000_000_123_456_789);
        let collaborator = Collaborator {
            ref_id: 1,
            client_id: "c".into(),
            created_at: at,
        };
        let wire = to_wire_collaborator(Some(&collaborator)).unwrap();
        assert_eq!(wire.created_at, 1_700_000_000_123_456_789);
    }

    #[test]
    fn object_path_roundtrip_still_verifies() {
        let tree = tree();
        let proof = ObjectPath::build(&tree, &p("/docs/a.txt"), 1, MAX_RECURSION_DEPTH).unwrap();
        let wire = to_wire_object_path(Some(&proof));
        let back = from_wire_object_path(wire.as_ref()).unwrap().unwrap();
        assert_eq!(back, proof);
        back.verify().unwrap();
    }

    #[test]
    fn oversized_object_path_is_truncated_on_decode() {
        let tree = tree();
        let proof = ObjectPath::build(&tree, &p("/docs/a.txt"), 1, MAX_RECURSION_DEPTH).unwrap();
        let mut wire = to_wire_object_path(Some(&proof)).unwrap();
        let link = wire.links[0].clone();
        wire.links = vec![link; MAX_RECURSION_DEPTH + 50];
        let back = from_wire_object_path(Some(&wire)).unwrap().unwrap();
        assert!(back.truncated);
        assert_eq!(back.links.len(), MAX_RECURSION_DEPTH);
    }

    #[test]
    fn reference_path_roundtrip_is_exact() {
        let tree = tree();
        for rp in [
            ReferencePath::subtree(&tree, &AllocationPath::root(), MAX_RECURSION_DEPTH).unwrap(),
            ReferencePath::from_paths(&tree, &[p("/docs/b")], MAX_RECURSION_DEPTH).unwrap(),
            ReferencePath::subtree(&tree, &AllocationPath::root(), 1).unwrap(),
        ] {
            let wire = to_wire_reference_path(Some(&rp));
            let back = from_wire_reference_path(wire.as_ref()).unwrap();
            assert_eq!(back, Some(rp));
        }
    }

    fn wire_dir(path: &str) -> Option<WireFileRef> {
        let dir = Ref::directory(0, "alloc", &p(path), Utc::now());
        to_wire_ref(Some(&dir))
    }

    /// A chain of `len` directories, each the only child of the one before.
    fn wire_chain(len: usize) -> WireReferencePath {
        let meta = wire_dir("/d");
        let nodes = (0..len)
            .map(|i| WireRefNode {
                meta: meta.clone(),
                children: if i + 1 < len { vec![(i + 1) as u32] } else { Vec::new() },
            })
            .collect();
        WireReferencePath {
            nodes,
            root: 0,
            truncated: false,
        }
    }

    #[test]
    fn deeply_nested_wire_is_truncated() {
        let rp = from_wire_reference_path(Some(&wire_chain(MAX_RECURSION_DEPTH + 40)))
            .unwrap()
            .unwrap();
        assert!(rp.truncated);
        assert_eq!(rp.len(), MAX_RECURSION_DEPTH + 1);

        let exact = from_wire_reference_path(Some(&wire_chain(MAX_RECURSION_DEPTH + 1)))
            .unwrap()
            .unwrap();
        assert!(!exact.truncated);
    }

    #[test]
    fn deep_peer_frame_decodes_without_recursion() {
        let message = BlobberMessage::ReferencePathResponse {
            reference_path: Some(wire_chain(20_000)),
            latest_write_marker: None,
        };
        let frame = BlobberCodec::encode(&message).unwrap();
        let (decoded, used) = BlobberCodec::decode(&frame).unwrap();
        assert_eq!(used, frame.len());
        let BlobberMessage::ReferencePathResponse { reference_path, .. } = decoded else {
            panic!("unexpected message: {decoded:?}");
        };
        let rp = from_wire_reference_path(reference_path.as_ref()).unwrap().unwrap();
        assert!(rp.truncated);
        assert_eq!(rp.len(), MAX_RECURSION_DEPTH + 1);
    }

    #[test]
    fn cyclic_wire_terminates() {
        let mut wire = wire_chain(3);
        wire.nodes[2].children = vec![0, 1, 99];
        let rp = from_wire_reference_path(Some(&wire)).unwrap().unwrap();
        assert!(rp.truncated);
        // Repeated nodes come back as leaves; the dangling index is dropped.
        assert_eq!(rp.len(), 5);
        assert!(rp.nodes[3].children.is_empty() && rp.nodes[4].children.is_empty());

        wire.root = 7;
        assert!(matches!(
            from_wire_reference_path(Some(&wire)),
            Err(ProtocolError::InvalidField { field: "root", .. })
        ));
    }

    #[test]
    fn back_edge_arena_encodes_finitely() {
        let dir = |path: &str| Ref::directory(0, "alloc", &p(path), Utc::now());
        let arena = ReferencePath::from_parts(
            vec![
                PathNode {
                    meta: dir("/"),
                    children: vec![1],
                },
                PathNode {
                    meta: dir("/a"),
                    children: vec![0, 1, 7],
                },
            ],
            Some(0),
        );
        let wire = to_wire_reference_path(Some(&arena)).unwrap();
        assert!(wire.truncated);
        assert_eq!(wire.nodes.len(), 4);
        assert_eq!(wire.nodes[1].children, [2, 3]);
        assert!(wire.nodes[2..].iter().all(|n| n.children.is_empty()));

        let back = from_wire_reference_path(Some(&wire)).unwrap().unwrap();
        assert!(back.truncated);
        assert_eq!(back.len(), 4);
    }

    proptest::proptest! {
        #[test]
        fn random_trees_roundtrip_through_wire(
            names in proptest::collection::btree_set("[a-d](/[a-d]){0,3}", 1..12),
            depth in 1usize..6,
        ) {
            let mut tree = RefTree::new("alloc");
            for name in &names {
                // Paths colliding with an existing file or directory are skipped.
                let _ = tree.upsert(&p(&format!("/{name}")), FileUpdate::from_content(name.as_bytes()));
            }
            let rp = ReferencePath::subtree(&tree, &AllocationPath::root(), depth).unwrap();
            let back = from_wire_reference_path(to_wire_reference_path(Some(&rp)).as_ref()).unwrap();
            proptest::prop_assert_eq!(back, Some(rp));
        }
    }
}
