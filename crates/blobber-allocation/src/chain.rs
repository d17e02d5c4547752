use async_trait::async_trait;
use blobber_types::Timestamp;
use serde::{Deserialize, Serialize};

/// A confirmed ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub client_id: String,
    /// JSON-encoded output of the smart contract call.
    pub transaction_output: String,
    pub creation_date: Timestamp,
}

impl Transaction {
    /// Build a transaction whose output is `output` encoded as JSON.
    pub fn with_output<T: Serialize>(
        hash: impl Into<String>,
        client_id: impl Into<String>,
        output: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            hash: hash.into(),
            client_id: client_id.into(),
            transaction_output: serde_json::to_string(output)?,
            creation_date: blobber_types::now_seconds(),
        })
    }
}

/// Errors a ledger client can report.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Ledger query capability.
///
/// Implementations talk to the sharders of the network. The registry never
/// holds a lock across a call to this trait.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch a confirmed transaction by hash.
    async fn get_transaction(&self, hash: &str) -> Result<Transaction, LedgerError>;
}
