use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use crate::threads::chord::chord_proto::chord_client::ChordClient;
use crate::threads::chord::chord_proto::{
    Empty, FindSuccessorRequest, FindSuccessorResponse, GetFileRequest, NotifyRequest,
    StoreRequest,
};
use crate::utils::constants::{CONNECT_TIMEOUT_MILLIS, RPC_DEADLINE_MILLIS};
use crate::utils::types::{Address, HashPos};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid peer address {0:?}")]
    BadAddress(Address),
    #[error("cannot connect to {peer}: {source}")]
    Connect {
        peer: Address,
        source: tonic::transport::Error,
    },
    #[error("rpc to {peer} failed: {status}")]
    Rpc { peer: Address, status: Status },
}

/// Connection-cached RPC client, one open channel per peer address. Any
/// failed call evicts the cached entry; the caller decides whether to retry
/// or treat the peer as unreachable. Calls carry a bounded connect timeout
/// and a per-call deadline, so a dead peer surfaces as a failure instead of
/// a hang.
pub struct ClientPool {
    clients: Mutex<HashMap<Address, ChordClient<Channel>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        ClientPool {
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, peer: &Address) -> Result<ChordClient<Channel>, TransportError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(peer) {
            return Ok(client.clone());
        }
        let endpoint = Endpoint::from_shared(format!("http://{}", peer))
            .map_err(|_| TransportError::BadAddress(peer.clone()))?
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MILLIS))
            .timeout(Duration::from_millis(RPC_DEADLINE_MILLIS));
        let channel = endpoint
            .connect()
            .await
            .map_err(|source| TransportError::Connect {
                peer: peer.clone(),
                source,
            })?;
        let client = ChordClient::new(channel);
        clients.insert(peer.clone(), client.clone());
        debug!("Opened connection to {}", peer);
        Ok(client)
    }

    pub async fn evict(&self, peer: &Address) {
        if self.clients.lock().await.remove(peer).is_some() {
            debug!("Evicted cached connection to {}", peer);
        }
    }

    /// Drop every cached channel. Closing twice is harmless.
    pub async fn disconnect_all(&self) {
        self.clients.lock().await.clear();
    }

    /// NotFound is an answer from a healthy peer; everything else taints
    /// the cached channel.
    async fn rpc_failure(&self, peer: &Address, status: Status) -> TransportError {
        if status.code() != Code::NotFound {
            self.evict(peer).await;
        }
        TransportError::Rpc {
            peer: peer.clone(),
            status,
        }
    }

    pub async fn find_successor(
        &self,
        peer: &Address,
        id: HashPos,
    ) -> Result<FindSuccessorResponse, TransportError> {
        let mut client = self.client(peer).await?;
        match client
            .find_successor(Request::new(FindSuccessorRequest { id }))
            .await
        {
            Ok(response) => Ok(response.into_inner()),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn get_predecessor(
        &self,
        peer: &Address,
    ) -> Result<Option<Address>, TransportError> {
        let mut client = self.client(peer).await?;
        match client.get_predecessor(Request::new(Empty {})).await {
            Ok(response) => Ok(response
                .into_inner()
                .address
                .filter(|address| !address.is_empty())),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn get_successors(&self, peer: &Address) -> Result<Vec<Address>, TransportError> {
        let mut client = self.client(peer).await?;
        match client.get_successors(Request::new(Empty {})).await {
            Ok(response) => Ok(response.into_inner().successors),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn notify(&self, peer: &Address, own_address: &Address) -> Result<bool, TransportError> {
        let mut client = self.client(peer).await?;
        match client
            .notify(Request::new(NotifyRequest {
                address: own_address.clone(),
            }))
            .await
        {
            Ok(response) => Ok(response.into_inner().accepted),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn ping(&self, peer: &Address) -> Result<(), TransportError> {
        let mut client = self.client(peer).await?;
        match client.ping(Request::new(Empty {})).await {
            Ok(_) => Ok(()),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn store(
        &self,
        peer: &Address,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), TransportError> {
        let mut client = self.client(peer).await?;
        match client
            .store(Request::new(StoreRequest {
                key: key.to_string(),
                value,
            }))
            .await
        {
            Ok(_) => Ok(()),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }

    pub async fn get_file(&self, peer: &Address, key: &str) -> Result<Vec<u8>, TransportError> {
        let mut client = self.client(peer).await?;
        match client
            .get_file(Request::new(GetFileRequest {
                key: key.to_string(),
            }))
            .await
        {
            Ok(response) => Ok(response.into_inner().value),
            Err(status) => Err(self.rpc_failure(peer, status).await),
        }
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportError {
    /// True when the failure was an application-level NotFound rather than
    /// an unreachable peer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Rpc { status, .. } if status.code() == Code::NotFound)
    }
}
