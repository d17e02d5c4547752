/// A link in a chain of allocation roots.
///
/// Every committed write marker moves an allocation from `previous_root`
/// to `new_root`; a well-formed history is a sequence in which each link
/// starts where the last one ended.
pub trait RootLink {
    fn previous_root(&self) -> &str;
    fn new_root(&self) -> &str;
}

/// Root-chain integrity verifier.
pub struct RootChainVerifier;

impl RootChainVerifier {
    /// Verify that `links` form an unbroken chain starting at `genesis_root`.
    ///
    /// Returns the root the chain ends at, which equals `genesis_root` for
    /// an empty chain.
    pub fn verify_chain<'a, L: RootLink>(
        genesis_root: &'a str,
        links: &'a [L],
    ) -> Result<&'a str, ChainError> {
        let mut head = genesis_root;
        for (index, link) in links.iter().enumerate() {
            if link.previous_root() != head {
                return Err(ChainError::BrokenLink {
                    index,
                    expected: head.to_string(),
                    found: link.previous_root().to_string(),
                });
            }
            head = link.new_root();
        }
        Ok(head)
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("broken link at index {index}: expected previous root {expected}, found {found}")]
    BrokenLink {
        index: usize,
        expected: String,
        found: String,
    },
}
