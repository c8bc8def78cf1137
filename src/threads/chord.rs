use std::sync::Arc;

use log::debug;
use tonic::{Request, Response, Status};

use crate::node::{Node, NodeError, SuccessorStep};
use crate::threads::chord::chord_proto::{
    Empty, FindSuccessorRequest, FindSuccessorResponse, FingerEntryMsg, GetFileRequest,
    GetFileResponse, GetPredecessorResponse, NodeSummaryMsg, NotifyRequest, NotifyResponse,
    StoreRequest, SuccessorListMsg,
};
use crate::utils::constants::RING_MASK;

pub mod chord_proto {
    tonic::include_proto!("chord");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("chord_descriptor");
}

/// gRPC face of the node. Every handler takes the state mutex, computes its
/// reply and returns; no handler issues an outbound RPC, so a slow peer can
/// never stall another peer's call into us.
pub struct ChordService {
    node: Arc<Node>,
}

impl ChordService {
    pub fn new(node: Arc<Node>) -> ChordService {
        ChordService { node }
    }
}

#[tonic::async_trait]
impl chord_proto::chord_server::Chord for ChordService {
    /// One routing step. The caller iterates on the forward hint; we never
    /// recurse on its behalf.
    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<FindSuccessorResponse>, Status> {
        let target = request.into_inner().id & RING_MASK;
        match self.node.successor_step(target) {
            Ok(SuccessorStep::Found(address)) => {
                debug!("Received find_successor call for {}, owner is {}", target, address);
                Ok(Response::new(FindSuccessorResponse {
                    found: true,
                    address,
                    forward: String::new(),
                }))
            }
            Ok(SuccessorStep::Forward(forward)) => {
                debug!("Received find_successor call for {}, forwarding to {}", target, forward);
                Ok(Response::new(FindSuccessorResponse {
                    found: false,
                    address: String::new(),
                    forward,
                }))
            }
            Err(NodeError::NotInitialized) => {
                Err(Status::unavailable("node is still joining the ring"))
            }
            Err(error) => Err(Status::internal(error.to_string())),
        }
    }

    async fn get_predecessor(
        &self,
        _: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        let predecessor = self.node.predecessor();
        debug!("Received get_predecessor call, predecessor is {:?}", predecessor);
        Ok(Response::new(GetPredecessorResponse {
            address: predecessor,
        }))
    }

    async fn get_successors(
        &self,
        _: Request<Empty>,
    ) -> Result<Response<SuccessorListMsg>, Status> {
        Ok(Response::new(SuccessorListMsg {
            successors: self.node.successor_vec(),
        }))
    }

    async fn notify(
        &self,
        request: Request<NotifyRequest>,
    ) -> Result<Response<NotifyResponse>, Status> {
        let peer = request.into_inner().address;
        if peer.is_empty() {
            return Err(Status::invalid_argument("notify carries no address"));
        }
        let accepted = self.node.accept_notify(&peer);
        Ok(Response::new(NotifyResponse { accepted }))
    }

    /// Liveness probe for check_predecessor.
    async fn ping(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }

    async fn store(&self, request: Request<StoreRequest>) -> Result<Response<Empty>, Status> {
        let request = request.into_inner();
        debug!("Storing {} bytes under {:?}", request.value.len(), request.key);
        self.node.store_local(&request.key, request.value);
        Ok(Response::new(Empty {}))
    }

    async fn get_file(
        &self,
        request: Request<GetFileRequest>,
    ) -> Result<Response<GetFileResponse>, Status> {
        let key = request.into_inner().key;
        match self.node.fetch_local(&key) {
            Some(value) => Ok(Response::new(GetFileResponse { value })),
            None => Err(Status::not_found(format!("no value stored under {:?}", key))),
        }
    }

    /// Snapshot consumed by the shell, the HTTP surface and ring_check.
    async fn get_node_summary(
        &self,
        _: Request<Empty>,
    ) -> Result<Response<NodeSummaryMsg>, Status> {
        let summary = self.node.summary();
        Ok(Response::new(NodeSummaryMsg {
            address: summary.address,
            id: summary.id,
            predecessor: summary.predecessor,
            successors: summary.successors,
            fingers: summary
                .fingers
                .into_iter()
                .map(|finger| FingerEntryMsg {
                    start: finger.start,
                    address: finger.address,
                    node_id: finger.node_id,
                })
                .collect(),
            bucket_keys: summary.bucket.into_iter().map(|entry| entry.key).collect(),
        }))
    }
}
