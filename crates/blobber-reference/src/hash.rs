//! Hash derivations for reference tree nodes.

use blobber_crypto::ContentHasher;
use blobber_types::AllocationPath;

/// `hex(H_path(path))`.
pub fn path_hash(path: &AllocationPath) -> String {
    ContentHasher::PATH.hash_hex(path.as_str().as_bytes())
}

/// `hex(H_path(allocation_id + ":" + path))`, unique across allocations.
pub fn lookup_hash(allocation_id: &str, path: &AllocationPath) -> String {
    ContentHasher::PATH.hash_hex(format!("{allocation_id}:{}", path.as_str()).as_bytes())
}

/// Aggregate hash of a directory from its `(name, hash)` children.
///
/// Children are folded in name order regardless of input order, so the
/// result depends only on the set of children.
pub fn dir_hash<'a, I>(children: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut entries: Vec<(&str, &str)> = children.into_iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    let listing = entries
        .iter()
        .map(|(name, hash)| format!("{name}:{hash}"))
        .collect::<Vec<_>>()
        .join(":");
    ContentHasher::DIR.hash_hex(listing.as_bytes())
}

/// `hex(H_blob(content))`.
pub fn content_hash(content: &[u8]) -> String {
    ContentHasher::BLOB.hash_hex(content)
}
