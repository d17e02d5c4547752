//! Request dispatch from protocol messages to node operations.

use blobber_protocol::{
    to_wire_allocation, to_wire_collaborator, to_wire_file_stats, to_wire_object_path,
    to_wire_ref, to_wire_reference_path, to_wire_write_marker, BlobberCodec, BlobberMessage,
    ProtocolError, ProtocolResult,
};
use blobber_types::AllocationPath;
use tracing::{debug, warn};

use crate::error::{NodeError, NodeResult};
use crate::node::StorageNode;

impl StorageNode {
    /// Answer one request. Failures become `BlobberMessage::Error` carrying
    /// the error kind's status code.
    pub async fn handle(&self, request: BlobberMessage) -> BlobberMessage {
        let kind = request.type_name();
        let allocation = request.allocation_id().unwrap_or_default().to_string();
        debug!(request = kind, allocation = %allocation, "handling request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                let kind_of = e.kind();
                warn!(
                    request = kind,
                    allocation = %allocation,
                    kind = %kind_of,
                    error = %e,
                    "request failed"
                );
                BlobberMessage::Error {
                    code: kind_of.code(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Decode one framed request, answer it, and frame the response.
    pub async fn handle_frame(&self, frame: &[u8]) -> ProtocolResult<Vec<u8>> {
        let (request, _) = BlobberCodec::decode(frame)?;
        let response = self.handle(request).await;
        BlobberCodec::encode(&response)
    }

    async fn dispatch(&self, request: BlobberMessage) -> NodeResult<BlobberMessage> {
        match request {
            BlobberMessage::GetAllocationRequest { allocation_id } => {
                let allocation = self.verify_allocation(&allocation_id, false).await?;
                Ok(BlobberMessage::AllocationResponse {
                    allocation: to_wire_allocation(Some(&allocation)),
                })
            }
            BlobberMessage::GetFileMetaRequest {
                allocation_id,
                path,
            } => {
                let view = self.file_meta(&allocation_id, &parse_path(&path)?).await?;
                Ok(BlobberMessage::FileMetaResponse {
                    meta: to_wire_ref(Some(&view.meta)),
                    stats: to_wire_file_stats(view.stats.as_ref()),
                    collaborators: view
                        .collaborators
                        .iter()
                        .filter_map(|c| to_wire_collaborator(Some(c)))
                        .collect(),
                })
            }
            BlobberMessage::GetObjectPathRequest {
                allocation_id,
                path,
                block_num,
            } => {
                // Without a path the block number is global.
                let object_path = if path.is_empty() {
                    self.locate_block(&allocation_id, block_num).await?
                } else {
                    self.object_path(&allocation_id, &parse_path(&path)?, block_num)
                        .await?
                };
                Ok(BlobberMessage::ObjectPathResponse {
                    object_path: to_wire_object_path(Some(&object_path)),
                    latest_write_marker: self.latest_wire_marker(&allocation_id)?,
                })
            }
            BlobberMessage::GetReferencePathRequest {
                allocation_id,
                paths,
            } => {
                let paths = paths
                    .iter()
                    .map(|p| parse_path(p))
                    .collect::<NodeResult<Vec<_>>>()?;
                let reference_path = self.reference_path(&allocation_id, &paths).await?;
                Ok(BlobberMessage::ReferencePathResponse {
                    reference_path: to_wire_reference_path(Some(&reference_path)),
                    latest_write_marker: self.latest_wire_marker(&allocation_id)?,
                })
            }
            BlobberMessage::GetObjectTreeRequest {
                allocation_id,
                path,
                caller,
            } => {
                let tree = self
                    .object_tree(&allocation_id, &parse_path(&path)?, &caller)
                    .await?;
                Ok(BlobberMessage::ObjectTreeResponse {
                    reference_path: to_wire_reference_path(Some(&tree)),
                    latest_write_marker: self.latest_wire_marker(&allocation_id)?,
                })
            }
            BlobberMessage::GetLatestWriteMarkerRequest { allocation_id } => {
                self.verify_allocation(&allocation_id, false).await?;
                Ok(BlobberMessage::WriteMarkerResponse {
                    latest: self.latest_wire_marker(&allocation_id)?,
                })
            }
            other => Err(ProtocolError::InvalidMessageType(other.type_tag()).into()),
        }
    }

    fn latest_wire_marker(
        &self,
        allocation_id: &str,
    ) -> NodeResult<Option<blobber_protocol::WireWriteMarker>> {
        Ok(to_wire_write_marker(
            self.latest_write_marker(allocation_id)?.as_ref(),
        ))
    }
}

fn parse_path(path: &str) -> NodeResult<AllocationPath> {
    AllocationPath::parse(path).map_err(NodeError::from)
}

#[cfg(test)]
mod tests {
    use crate::auth::sign_as_owner;
    use crate::node::tests::{owner_key, Fixture};
    use blobber_protocol::{
        from_wire_object_path, from_wire_reference_path, BlobberCodec, BlobberMessage,
        CallerIdentity,
    };

    #[tokio::test]
    async fn allocation_request_returns_share() {
        let fx = Fixture::new();
        let response = fx
            .node
            .handle(BlobberMessage::GetAllocationRequest {
                allocation_id: "tx1".into(),
            })
            .await;
        let BlobberMessage::AllocationResponse {
            allocation: Some(allocation),
        } = response
        else {
            panic!("unexpected response: {response:?}");
        };
        assert_eq!(allocation.blobber_size, 50);
        assert_eq!(allocation.terms.len(), 1);
    }

    #[tokio::test]
    async fn unknown_allocation_is_404() {
        let fx = Fixture::new();
        let response = fx
            .node
            .handle(BlobberMessage::GetLatestWriteMarkerRequest {
                allocation_id: "missing".into(),
            })
            .await;
        assert!(matches!(response, BlobberMessage::Error { code: 404, .. }));
    }

    #[tokio::test]
    async fn object_path_over_the_wire_verifies() {
        let fx = Fixture::new();
        fx.write("/docs/a", b"abc", 1).await;
        let entry = fx.write("/docs/b", b"de", 2).await;

        for path in ["/docs/b", ""] {
            let block_num = if path.is_empty() { 2 } else { 1 };
            let response = fx
                .node
                .handle(BlobberMessage::GetObjectPathRequest {
                    allocation_id: "tx1".into(),
                    path: path.into(),
                    block_num,
                })
                .await;
            let BlobberMessage::ObjectPathResponse {
                object_path,
                latest_write_marker,
            } = response
            else {
                panic!("unexpected response: {response:?}");
            };
            let decoded = from_wire_object_path(object_path.as_ref()).unwrap().unwrap();
            decoded.verify_against(&entry.marker.allocation_root).unwrap();
            assert_eq!(
                latest_write_marker.unwrap().allocation_root,
                entry.marker.allocation_root
            );
        }
    }

    #[tokio::test]
    async fn reference_path_request_round_trips_through_frames() {
        let fx = Fixture::new();
        fx.write("/docs/a", b"abc", 1).await;
        fx.write("/music/b", b"de", 2).await;

        let request = BlobberMessage::GetReferencePathRequest {
            allocation_id: "tx1".into(),
            paths: vec!["/docs/a".into()],
        };
        let frame = BlobberCodec::encode(&request).unwrap();
        let reply = fx.node.handle_frame(&frame).await.unwrap();
        let (response, used) = BlobberCodec::decode(&reply).unwrap();
        assert_eq!(used, reply.len());

        let BlobberMessage::ReferencePathResponse { reference_path, .. } = response else {
            panic!("unexpected response: {response:?}");
        };
        let rp = from_wire_reference_path(reference_path.as_ref())
            .unwrap()
            .unwrap();
        let paths: Vec<String> = rp.paths(150).iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, ["/", "/docs", "/docs/a"]);
    }

    #[tokio::test]
    async fn object_tree_requires_owner() {
        let fx = Fixture::new();
        fx.write("/a", b"a", 1).await;

        let request = |caller: CallerIdentity| BlobberMessage::GetObjectTreeRequest {
            allocation_id: "tx1".into(),
            path: "/".into(),
            caller,
        };
        let denied = fx.node.handle(request(CallerIdentity::anonymous())).await;
        assert!(matches!(denied, BlobberMessage::Error { code: 401, .. }));

        let allowed = fx
            .node
            .handle(request(sign_as_owner("owner", &owner_key(), "tx1")))
            .await;
        assert!(matches!(
            allowed,
            BlobberMessage::ObjectTreeResponse {
                reference_path: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bad_path_and_response_messages_are_400() {
        let fx = Fixture::new();
        let bad_path = fx
            .node
            .handle(BlobberMessage::GetFileMetaRequest {
                allocation_id: "tx1".into(),
                path: "relative/path".into(),
            })
            .await;
        assert!(matches!(bad_path, BlobberMessage::Error { code: 400, .. }));

        let too_deep = fx
            .node
            .handle(BlobberMessage::GetReferencePathRequest {
                allocation_id: "tx1".into(),
                paths: vec!["/d".repeat(blobber_types::MAX_PATH_DEPTH + 1)],
            })
            .await;
        assert!(matches!(too_deep, BlobberMessage::Error { code: 400, .. }));

        let wrong_way = fx
            .node
            .handle(BlobberMessage::WriteMarkerResponse { latest: None })
            .await;
        assert!(matches!(wrong_way, BlobberMessage::Error { code: 400, .. }));
    }

    #[tokio::test]
    async fn file_meta_carries_stats_and_collaborators() {
        let fx = Fixture::new();
        fx.write("/f", b"file", 1).await;
        let owner = sign_as_owner("owner", &owner_key(), "tx1");
        fx.node
            .add_collaborator("tx1", &crate::node::tests::p("/f"), "friend", &owner)
            .await
            .unwrap();

        let response = fx
            .node
            .handle(BlobberMessage::GetFileMetaRequest {
                allocation_id: "tx1".into(),
                path: "/f".into(),
            })
            .await;
        let BlobberMessage::FileMetaResponse {
            meta,
            stats,
            collaborators,
        } = response
        else {
            panic!("unexpected response: {response:?}");
        };
        assert_eq!(meta.unwrap().ref_type, "f");
        assert_eq!(stats.unwrap().num_updates, 1);
        assert_eq!(collaborators.len(), 1);
        assert_eq!(collaborators[0].client_id, "friend");
    }
}
