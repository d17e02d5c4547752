use std::sync::Arc;

use blobber_allocation::{
    Allocation, AllocationRegistry, AllocationStore, ChainClient, InMemoryAllocationStore,
};
use blobber_crypto::{Ed25519Scheme, MerkleProof, SignatureScheme, BLOCK_SIZE};
use blobber_proof::{ObjectPath, PathProofBuilder, ProofResult, ReferencePath};
use blobber_protocol::CallerIdentity;
use blobber_reference::{
    block_proof, content_hash, Collaborator, FileStats, InMemoryRefTreeStore, Listing, Ref,
    RefTree, RefTreeStore, TreeMutation,
};
use blobber_types::AllocationPath;
use blobber_writemarker::{
    ChainReport, InMemoryMarkerStore, MarkerEntry, MarkerResult, MarkerStore, WriteMarker,
    WriteMarkerLedger, WriteScope,
};
use tracing::{debug, info, warn};

use crate::auth::authorize_owner;
use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

/// Storage and verification backends a node runs on.
pub struct NodeBackends {
    pub allocations: Arc<dyn AllocationStore>,
    pub trees: Arc<dyn RefTreeStore>,
    pub markers: Arc<dyn MarkerStore>,
    pub scheme: Arc<dyn SignatureScheme>,
}

impl NodeBackends {
    /// Ephemeral stores and Ed25519 verification.
    pub fn in_memory() -> Self {
        Self {
            allocations: Arc::new(InMemoryAllocationStore::new()),
            trees: Arc::new(InMemoryRefTreeStore::new()),
            markers: Arc::new(InMemoryMarkerStore::new()),
            scheme: Arc::new(Ed25519Scheme),
        }
    }
}

/// A file's metadata together with its bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetaView {
    pub meta: Ref,
    /// `None` for directories.
    pub stats: Option<FileStats>,
    pub collaborators: Vec<Collaborator>,
}

/// Answer to a storage challenge: one block, its Merkle proof, and the
/// object path binding its file to the allocation root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeProof {
    pub object_path: ObjectPath,
    pub block: Vec<u8>,
    pub block_proof: MerkleProof,
}

impl ChallengeProof {
    /// Check the whole chain from `block` up to `allocation_root`.
    pub fn verify(&self, allocation_root: &str) -> ProofResult<()> {
        self.object_path.verify_against(allocation_root)?;
        self.object_path.verify_block(&self.block_proof, &self.block)
    }
}

/// One storage node: verified allocations, their reference trees, the
/// write-marker chain, and the proofs built over them.
///
/// Every request first resolves its allocation through the registry. Writes
/// then run inside the allocation's write scope on the blocking pool, so a
/// request waiting for the scope never stalls the async runtime; reads use
/// the committed tree snapshot directly.
pub struct StorageNode {
    config: NodeConfig,
    registry: AllocationRegistry,
    trees: Arc<dyn RefTreeStore>,
    ledger: Arc<WriteMarkerLedger>,
    proofs: PathProofBuilder,
    scheme: Arc<dyn SignatureScheme>,
}

impl StorageNode {
    /// A node over in-memory backends.
    pub fn new(config: NodeConfig, chain: Arc<dyn ChainClient>) -> NodeResult<Self> {
        Self::with_backends(config, chain, NodeBackends::in_memory())
    }

    pub fn with_backends(
        config: NodeConfig,
        chain: Arc<dyn ChainClient>,
        backends: NodeBackends,
    ) -> NodeResult<Self> {
        config.validate()?;
        let registry =
            AllocationRegistry::new(&config.blobber_id, chain, backends.allocations.clone());
        let ledger = Arc::new(WriteMarkerLedger::new(
            &config.blobber_id,
            backends.allocations,
            backends.trees.clone(),
            backends.markers,
            backends.scheme.clone(),
        ));
        let proofs =
            PathProofBuilder::new(backends.trees.clone()).with_max_depth(config.max_recursion_depth);
        info!(
            blobber = %config.blobber_id,
            max_depth = proofs.max_depth(),
            "storage node ready"
        );
        Ok(Self {
            config,
            registry,
            trees: backends.trees,
            ledger,
            proofs,
            scheme: backends.scheme,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn blobber_id(&self) -> &str {
        &self.config.blobber_id
    }

    pub fn ledger(&self) -> &WriteMarkerLedger {
        &self.ledger
    }

    // ---- Allocations ----

    pub async fn verify_allocation(
        &self,
        allocation_id: &str,
        readonly: bool,
    ) -> NodeResult<Allocation> {
        Ok(self
            .registry
            .verify_allocation(allocation_id, readonly)
            .await?)
    }

    /// The persisted row, without consulting the ledger.
    pub fn allocation(&self, allocation_id: &str) -> NodeResult<Allocation> {
        Ok(self.registry.get(allocation_id)?)
    }

    // ---- Writes ----

    /// Verify the allocation, then validate `marker` and commit `mutation`
    /// under it atomically.
    pub async fn commit_write(
        &self,
        marker: WriteMarker,
        mutation: TreeMutation,
    ) -> NodeResult<MarkerEntry> {
        self.verify_allocation(&marker.allocation_id, false).await?;
        debug!(
            allocation = %marker.allocation_id,
            changes = mutation.len(),
            "committing write"
        );
        let allocation_id = marker.allocation_id.clone();
        self.in_scope(&allocation_id, move |scope| {
            scope.propose(&marker)?;
            scope.commit(&marker, &mutation)
        })
        .await
    }

    /// Record that the marker with `allocation_root` was settled on the
    /// ledger by `txn_id`.
    pub async fn mark_redeemed(
        &self,
        allocation_id: &str,
        allocation_root: &str,
        txn_id: &str,
    ) -> NodeResult<MarkerEntry> {
        let ledger = Arc::clone(&self.ledger);
        let (id, root, txn) = (
            allocation_id.to_string(),
            allocation_root.to_string(),
            txn_id.to_string(),
        );
        tokio::task::spawn_blocking(move || ledger.mark_redeemed(&id, &root, &txn))
            .await
            .map_err(|e| NodeError::Internal(format!("redeem task: {e}")))?
            .map_err(NodeError::from)
    }

    pub fn latest_write_marker(&self, allocation_id: &str) -> NodeResult<Option<WriteMarker>> {
        Ok(self.ledger.head(allocation_id)?.map(|entry| entry.marker))
    }

    pub fn verify_chain(&self, allocation_id: &str) -> NodeResult<ChainReport> {
        Ok(self.ledger.verify_chain(allocation_id)?)
    }

    // ---- Reads ----

    /// The committed tree snapshot.
    pub fn tree(&self, allocation_id: &str) -> NodeResult<Arc<RefTree>> {
        Ok(self.trees.load(allocation_id)?)
    }

    pub async fn list(&self, allocation_id: &str, path: &AllocationPath) -> NodeResult<Listing> {
        self.verify_allocation(allocation_id, false).await?;
        Ok(self.tree(allocation_id)?.children_of(path)?)
    }

    pub async fn lookup_by_hash(&self, allocation_id: &str, lookup_hash: &str) -> NodeResult<Ref> {
        self.verify_allocation(allocation_id, false).await?;
        Ok(self.tree(allocation_id)?.lookup_by_hash(lookup_hash)?.clone())
    }

    pub async fn file_meta(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
    ) -> NodeResult<FileMetaView> {
        self.verify_allocation(allocation_id, false).await?;
        let tree = self.tree(allocation_id)?;
        let meta = tree.lookup_by_path(path)?.clone();
        let stats = if meta.is_file() {
            Some(tree.file_stats(path)?.clone())
        } else {
            None
        };
        let collaborators = tree.collaborators(path)?.to_vec();
        Ok(FileMetaView {
            meta,
            stats,
            collaborators,
        })
    }

    // ---- Proofs ----

    /// Object path for the node at `path`; `block_num` is file-local.
    pub async fn object_path(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        block_num: i64,
    ) -> NodeResult<ObjectPath> {
        self.verify_allocation(allocation_id, false).await?;
        Ok(self.proofs.build_object_path(allocation_id, path, block_num)?)
    }

    /// Object path for the file holding global block `block_num`.
    pub async fn locate_block(&self, allocation_id: &str, block_num: i64) -> NodeResult<ObjectPath> {
        self.verify_allocation(allocation_id, false).await?;
        Ok(self.proofs.locate_block(allocation_id, block_num)?)
    }

    pub async fn reference_path(
        &self,
        allocation_id: &str,
        paths: &[AllocationPath],
    ) -> NodeResult<ReferencePath> {
        self.verify_allocation(allocation_id, false).await?;
        Ok(self.proofs.build_reference_path(allocation_id, paths)?)
    }

    /// Full subtree at `path`. Owner only.
    pub async fn object_tree(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        caller: &CallerIdentity,
    ) -> NodeResult<ReferencePath> {
        let allocation = self.verify_allocation(allocation_id, false).await?;
        authorize_owner(&allocation, caller, self.scheme.as_ref())?;
        Ok(self.proofs.build_object_tree(allocation_id, path)?)
    }

    /// Prove possession of global block `block_num`.
    ///
    /// `content` is the stored body of the file holding the block. The
    /// outcome is recorded against the file's stats under `challenge_txn`
    /// whether or not the content checks out.
    pub async fn prove_block(
        &self,
        allocation_id: &str,
        block_num: i64,
        content: &[u8],
        challenge_txn: &str,
    ) -> NodeResult<ChallengeProof> {
        let object_path = self.locate_block(allocation_id, block_num).await?;
        let path = object_path.meta.path.clone();
        let expected = object_path
            .meta
            .file_meta()
            .map(|file| file.content_hash.clone())
            .unwrap_or_default();

        let proof = if content_hash(content) == expected {
            block_slice(content, object_path.file_block_num).and_then(|block| {
                block_proof(content, object_path.file_block_num)
                    .map(|proof| (block.to_vec(), proof))
            })
        } else {
            None
        };

        let passed = proof.is_some();
        let txn = challenge_txn.to_string();
        let recorded = path.clone();
        self.in_scope(allocation_id, move |scope| {
            scope.update_metadata(|tree| tree.record_challenge(&recorded, passed, &txn))
        })
        .await?;

        match proof {
            Some((block, merkle)) => {
                info!(
                    allocation = %allocation_id,
                    path = %path,
                    block = block_num,
                    "challenge answered"
                );
                Ok(ChallengeProof {
                    object_path,
                    block,
                    block_proof: merkle,
                })
            }
            None => {
                warn!(allocation = %allocation_id, path = %path, block = block_num, "challenge failed");
                Err(NodeError::ChallengeFailed {
                    path: path.to_string(),
                    reason: "stored content does not match the committed hash".into(),
                })
            }
        }
    }

    // ---- Metadata ----

    /// Grant `client_id` access to the file at `path`. Owner only.
    pub async fn add_collaborator(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        client_id: &str,
        caller: &CallerIdentity,
    ) -> NodeResult<bool> {
        let allocation = self.verify_allocation(allocation_id, false).await?;
        authorize_owner(&allocation, caller, self.scheme.as_ref())?;
        let (path, client) = (path.clone(), client_id.to_string());
        self.in_scope(allocation_id, move |scope| {
            scope.update_metadata(|tree| tree.add_collaborator(&path, &client))
        })
        .await
    }

    /// Revoke `client_id`'s access to the file at `path`. Owner only.
    pub async fn remove_collaborator(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        client_id: &str,
        caller: &CallerIdentity,
    ) -> NodeResult<bool> {
        let allocation = self.verify_allocation(allocation_id, false).await?;
        authorize_owner(&allocation, caller, self.scheme.as_ref())?;
        let (path, client) = (path.clone(), client_id.to_string());
        self.in_scope(allocation_id, move |scope| {
            scope.update_metadata(|tree| tree.remove_collaborator(&path, &client))
        })
        .await
    }

    /// The owner and the file's collaborators may read it.
    pub fn can_read(&self, allocation: &Allocation, path: &AllocationPath, client_id: &str) -> bool {
        client_id == allocation.owner_id
            || self
                .trees
                .load(&allocation.id)
                .map(|tree| tree.is_collaborator(path, client_id))
                .unwrap_or(false)
    }

    pub async fn record_block_downloads(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        blocks: i64,
    ) -> NodeResult<()> {
        self.verify_allocation(allocation_id, false).await?;
        let path = path.clone();
        self.in_scope(allocation_id, move |scope| {
            scope.update_metadata(|tree| tree.record_block_downloads(&path, blocks))
        })
        .await
    }

    /// Attach ledger transaction `txn_id` to the file's commit log.
    pub async fn add_commit_meta_txn(
        &self,
        allocation_id: &str,
        path: &AllocationPath,
        txn_id: &str,
    ) -> NodeResult<()> {
        self.verify_allocation(allocation_id, false).await?;
        let (path, txn) = (path.clone(), txn_id.to_string());
        self.in_scope(allocation_id, move |scope| {
            scope.update_metadata(|tree| tree.add_commit_meta_txn(&path, &txn))
        })
        .await
    }

    /// Run `f` in the allocation's write scope on the blocking pool.
    async fn in_scope<R, F>(&self, allocation_id: &str, f: F) -> NodeResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut WriteScope<'_>) -> MarkerResult<R> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        let id = allocation_id.to_string();
        tokio::task::spawn_blocking(move || ledger.with_write_scope(&id, f))
            .await
            .map_err(|e| NodeError::Internal(format!("write scope task: {e}")))?
            .map_err(NodeError::from)
    }
}

impl std::fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageNode")
            .field("config", &self.config)
            .field("proofs", &self.proofs)
            .finish_non_exhaustive()
    }
}

/// Bytes of 1-based `block_num` within `content`.
fn block_slice(content: &[u8], block_num: i64) -> Option<&[u8]> {
    let index = usize::try_from(block_num.checked_sub(1)?).ok()?;
    content.chunks(BLOCK_SIZE).nth(index)
}
