use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::node::finger_table::{FingerEntry, FingerTable};
use crate::node::successor_list::SuccessorList;
use crate::transport::{ClientPool, TransportError};
use crate::utils::constants::{
    JOIN_MAX_RETRIES, JOIN_RETRY_SLEEP_MILLIS, MAX_LOOKUP_HOPS, RING_BITS,
};
use crate::utils::crypto::{finger_start, hash, is_between};
use crate::utils::types::{Address, Bucket, HashPos};

pub mod finger_table;
pub mod successor_list;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is already part of a ring")]
    AlreadyInitialized,
    #[error("node has not created or joined a ring yet")]
    NotInitialized,
    #[error("lookup of position {target} gave up after {hops} hops")]
    HopLimit { target: HashPos, hops: usize },
    #[error("no value stored under {0:?}")]
    KeyAbsent(String),
    #[error("joining via {seed} failed: {source}")]
    JoinFailed {
        seed: Address,
        source: TransportError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of a single routing step: either the owner of the target
/// position, or the next peer to ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessorStep {
    Found(Address),
    Forward(Address),
}

/// Everything mutable about the node, guarded by one mutex. The lock is
/// held for short computations only and never across an outbound RPC.
struct NodeState {
    initialized: bool,
    predecessor: Option<Address>,
    successors: SuccessorList,
    fingers: FingerTable,
    bucket: Bucket,
}

/// The running node: its immutable identity, the shared mutable state, and
/// the connection cache used to reach peers. Incoming handlers and the
/// maintenance loops all operate on this one record.
pub struct Node {
    address: Address,
    id: HashPos,
    state: Mutex<NodeState>,
    pool: ClientPool,
}

/// Point-in-time copy of the node state for the shell, the HTTP surface and
/// the summary RPC.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub address: Address,
    pub id: HashPos,
    pub predecessor: Option<Address>,
    pub successors: Vec<Address>,
    pub fingers: Vec<FingerSummary>,
    pub bucket: Vec<BucketEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerSummary {
    pub start: HashPos,
    pub address: Address,
    pub node_id: HashPos,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketEntry {
    pub key: String,
    pub size: usize,
}

impl Node {
    pub fn new(address: Address, successor_capacity: usize) -> Arc<Node> {
        let id = hash(address.as_bytes());
        Arc::new(Node {
            address,
            id,
            state: Mutex::new(NodeState {
                initialized: false,
                predecessor: None,
                successors: SuccessorList::new(successor_capacity),
                fingers: FingerTable::default(),
                bucket: Bucket::new(),
            }),
            pool: ClientPool::new(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn id(&self) -> HashPos {
        self.id
    }

    /// Start a brand new ring of one. Refuses a second initialization.
    pub fn create(&self) -> Result<(), NodeError> {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return Err(NodeError::AlreadyInitialized);
        }
        state.predecessor = None;
        state.successors.set_only(self.address.clone());
        state.initialized = true;
        info!("Created new ring, own position is {}", self.id);
        Ok(())
    }

    /// Join an existing ring through `seed`: resolve the successor of our
    /// own position and adopt it. The seed may still be starting up, so
    /// unreachability is retried a bounded number of times.
    pub async fn join(&self, seed: &Address) -> Result<(), NodeError> {
        if self.state.lock().unwrap().initialized {
            return Err(NodeError::AlreadyInitialized);
        }
        let mut attempt = 0;
        let successor = loop {
            match self.resolve_successor(seed, self.id).await {
                Ok(address) => break address,
                Err(NodeError::Transport(source)) => {
                    attempt += 1;
                    if attempt > JOIN_MAX_RETRIES {
                        return Err(NodeError::JoinFailed {
                            seed: seed.clone(),
                            source,
                        });
                    }
                    warn!("Seed {} not reachable yet ({}), retrying", seed, source);
                    sleep(Duration::from_millis(JOIN_RETRY_SLEEP_MILLIS)).await;
                }
                Err(other) => return Err(other),
            }
        };

        let mut state = self.state.lock().unwrap();
        state.predecessor = None;
        state.successors.set_only(successor.clone());
        state.initialized = true;
        info!(
            "Joined ring via {}, successor is {} at position {}",
            seed,
            successor,
            hash(successor.as_bytes())
        );
        Ok(())
    }

    /// One routing step against local state only: the FindSuccessor handler
    /// body. Found when the target lies in (own id, successor id]; otherwise
    /// forward to the closest preceding finger, falling back to the direct
    /// successor.
    pub fn successor_step(&self, target: HashPos) -> Result<SuccessorStep, NodeError> {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return Err(NodeError::NotInitialized);
        }
        let successor = state
            .successors
            .primary()
            .cloned()
            .ok_or(NodeError::NotInitialized)?;
        let successor_pos = hash(successor.as_bytes());
        if is_between(self.id, target, successor_pos, true) {
            return Ok(SuccessorStep::Found(successor));
        }
        let forward = state
            .fingers
            .closest_preceding(self.id, target)
            .unwrap_or(successor);
        Ok(SuccessorStep::Forward(forward))
    }

    /// Iterative successor resolution starting at `start`, following
    /// forward hints until some node reports the owner. Steps against this
    /// node short-circuit to local state instead of a loopback RPC. A hint
    /// cycling back to this node means no peer knows better, so the search
    /// terminates here.
    pub async fn resolve_successor(
        &self,
        start: &Address,
        target: HashPos,
    ) -> Result<Address, NodeError> {
        let mut hop = start.clone();
        for _ in 0..MAX_LOOKUP_HOPS {
            let step = if hop == self.address {
                self.successor_step(target)?
            } else {
                let reply = self.pool.find_successor(&hop, target).await?;
                if reply.found {
                    SuccessorStep::Found(reply.address)
                } else {
                    SuccessorStep::Forward(reply.forward)
                }
            };
            match step {
                SuccessorStep::Found(owner) => return Ok(owner),
                SuccessorStep::Forward(next) => {
                    if next == self.address {
                        return Ok(self.address.clone());
                    }
                    if next == hop {
                        // the peer routes everything to itself, it owns the arc
                        return Ok(hop);
                    }
                    hop = next;
                }
            }
        }
        Err(NodeError::HopLimit {
            target,
            hops: MAX_LOOKUP_HOPS,
        })
    }

    /// Notify handler body: adopt `peer` as predecessor when none is known
    /// or when it sits strictly between the current predecessor and this
    /// node. The reply is advisory; callers ignore it.
    pub fn accept_notify(&self, peer: &Address) -> bool {
        let mut state = self.state.lock().unwrap();
        let adopt = match state.predecessor {
            None => true,
            Some(ref predecessor) => is_between(
                hash(predecessor.as_bytes()),
                hash(peer.as_bytes()),
                self.id,
                false,
            ),
        };
        if adopt {
            debug!("Adopting {} as predecessor", peer);
            state.predecessor = Some(peer.clone());
        }
        adopt
    }

    /// One stabilize round: probe the successor's predecessor, adopt it when
    /// it sits between us, refresh the successor list from the (possibly
    /// new) successor, then advertise ourselves via Notify. A dead successor
    /// is dropped from the list; an emptied list resets to a ring of one.
    pub async fn stabilize(&self) {
        let Some(successor) = self.primary_successor() else {
            return;
        };

        let probed = if successor == self.address {
            Ok(self.predecessor())
        } else {
            self.pool.get_predecessor(&successor).await
        };
        match probed {
            Err(error) => {
                warn!(
                    "Successor {} unreachable during stabilize: {}",
                    successor, error
                );
                let mut state = self.state.lock().unwrap();
                state.successors.drop_primary(&self.address);
                return;
            }
            Ok(Some(candidate)) => {
                let candidate_pos = hash(candidate.as_bytes());
                if candidate != self.address && candidate_pos == self.id {
                    warn!(
                        "Node {} shares our ring position {}; stabilize may oscillate",
                        candidate, self.id
                    );
                }
                let successor_pos = hash(successor.as_bytes());
                if is_between(self.id, candidate_pos, successor_pos, false) {
                    debug!("Adopting closer successor {}", candidate);
                    let mut state = self.state.lock().unwrap();
                    state.successors.set_primary(candidate);
                }
            }
            Ok(None) => {}
        }

        let Some(successor) = self.primary_successor() else {
            return;
        };
        let tail = if successor == self.address {
            Ok(self.successor_vec())
        } else {
            self.pool.get_successors(&successor).await
        };
        match tail {
            Ok(tail) => {
                let mut state = self.state.lock().unwrap();
                state.successors.refresh(successor.clone(), tail);
            }
            Err(error) => {
                warn!(
                    "Cannot refresh successor list from {}: {}",
                    successor, error
                );
                return;
            }
        }

        if successor == self.address {
            self.accept_notify(&self.address);
        } else if let Err(error) = self.pool.notify(&successor, &self.address).await {
            warn!("Notify to {} failed: {}", successor, error);
        }
    }

    /// One fix_fingers round: rebuild the whole table by resolving the
    /// successor of (own id + 2^i) for every i. A failed resolution abandons
    /// the rest of the round; the next tick starts over.
    pub async fn fix_fingers(&self) {
        if !self.is_initialized() {
            return;
        }
        self.state.lock().unwrap().fingers.clear();
        for index in 0..RING_BITS {
            let start = finger_start(self.id, index);
            match self.resolve_successor(&self.address, start).await {
                Ok(owner) => {
                    let mut state = self.state.lock().unwrap();
                    state.fingers.push(FingerEntry::resolve(start, owner));
                }
                Err(error) => {
                    warn!("Abandoning fix_fingers round at finger {}: {}", index, error);
                    return;
                }
            }
        }
    }

    /// One check_predecessor round: a single Ping, no retry. Failure clears
    /// the predecessor so a later Notify can fill it again.
    pub async fn check_predecessor(&self) {
        let Some(predecessor) = self.predecessor() else {
            return;
        };
        if predecessor == self.address {
            return;
        }
        if let Err(error) = self.pool.ping(&predecessor).await {
            warn!("Predecessor {} unreachable: {}", predecessor, error);
            let mut state = self.state.lock().unwrap();
            if state.predecessor.as_ref() == Some(&predecessor) {
                state.predecessor = None;
            }
        }
    }

    /// Resolve the node owning `key`, starting from local state.
    pub async fn lookup(&self, key: &str) -> Result<Address, NodeError> {
        self.resolve_successor(&self.address, hash(key.as_bytes())).await
    }

    /// Store `value` under `key` on the owning node. Writes directly into
    /// the local bucket when the owner is this node; an RPC to ourselves
    /// would be pointless at best.
    pub async fn store(&self, key: &str, value: Vec<u8>) -> Result<Address, NodeError> {
        let owner = self.lookup(key).await?;
        if owner == self.address {
            self.store_local(key, value);
        } else {
            self.pool.store(&owner, key, value).await?;
        }
        Ok(owner)
    }

    /// Fetch the value stored under `key` from the owning node.
    pub async fn retrieve(&self, key: &str) -> Result<Vec<u8>, NodeError> {
        let owner = self.lookup(key).await?;
        if owner == self.address {
            return self
                .fetch_local(key)
                .ok_or_else(|| NodeError::KeyAbsent(key.to_string()));
        }
        match self.pool.get_file(&owner, key).await {
            Ok(value) => Ok(value),
            Err(error) if error.is_not_found() => Err(NodeError::KeyAbsent(key.to_string())),
            Err(error) => Err(error.into()),
        }
    }

    pub fn store_local(&self, key: &str, value: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .bucket
            .insert(key.to_string(), value);
    }

    pub fn fetch_local(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().bucket.get(key).cloned()
    }

    pub fn predecessor(&self) -> Option<Address> {
        self.state.lock().unwrap().predecessor.clone()
    }

    pub fn successor_vec(&self) -> Vec<Address> {
        self.state.lock().unwrap().successors.to_vec()
    }

    fn primary_successor(&self) -> Option<Address> {
        self.state.lock().unwrap().successors.primary().cloned()
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn summary(&self) -> NodeSummary {
        let state = self.state.lock().unwrap();
        let mut bucket: Vec<BucketEntry> = state
            .bucket
            .iter()
            .map(|(key, value)| BucketEntry {
                key: key.clone(),
                size: value.len(),
            })
            .collect();
        bucket.sort_by(|a, b| a.key.cmp(&b.key));
        NodeSummary {
            address: self.address.clone(),
            id: self.id,
            predecessor: state.predecessor.clone(),
            successors: state.successors.to_vec(),
            fingers: state
                .fingers
                .fingers
                .iter()
                .map(|finger| FingerSummary {
                    start: finger.start,
                    address: finger.address.clone(),
                    node_id: finger.node_pos,
                })
                .collect(),
            bucket,
        }
    }

    /// Tear down the connection cache on shutdown.
    pub async fn disconnect_all(&self) {
        self.pool.disconnect_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct_addresses(count: usize) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for port in 4600..u16::MAX {
            let candidate = format!("127.0.0.1:{}", port);
            let pos = hash(candidate.as_bytes());
            if addresses.iter().all(|a| hash(a.as_bytes()) != pos) {
                addresses.push(candidate);
                if addresses.len() == count {
                    break;
                }
            }
        }
        addresses
    }

    #[test]
    fn create_refuses_a_second_initialization() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.create().unwrap();
        assert!(matches!(
            node.create(),
            Err(NodeError::AlreadyInitialized)
        ));
    }

    #[test]
    fn uninitialized_node_cannot_route() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        assert!(matches!(
            node.successor_step(1),
            Err(NodeError::NotInitialized)
        ));
    }

    #[test]
    fn singleton_owns_every_position_but_forwards_its_own() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.create().unwrap();
        let other = (node.id() + 1) & crate::utils::constants::RING_MASK;
        assert_eq!(
            node.successor_step(other).unwrap(),
            SuccessorStep::Found(node.address().clone())
        );
        // own position is not inside (id, id]; the step falls through to a
        // forward hint pointing back at the node itself
        assert_eq!(
            node.successor_step(node.id()).unwrap(),
            SuccessorStep::Forward(node.address().clone())
        );
    }

    #[test]
    fn notify_adopts_then_holds() {
        let addresses = distinct_addresses(2);
        let node = Node::new(addresses[0].clone(), 3);
        node.create().unwrap();

        assert!(node.accept_notify(&addresses[1]));
        assert_eq!(node.predecessor(), Some(addresses[1].clone()));
        // the same peer again is no longer strictly between
        assert!(!node.accept_notify(&addresses[1]));
        assert_eq!(node.predecessor(), Some(addresses[1].clone()));
    }

    #[test]
    fn bucket_round_trips_locally() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.store_local("hello.txt", b"hi there".to_vec());
        assert_eq!(node.fetch_local("hello.txt"), Some(b"hi there".to_vec()));
        assert_eq!(node.fetch_local("absent.txt"), None);
    }

    #[tokio::test]
    async fn singleton_stabilize_converges_to_itself() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.create().unwrap();
        node.stabilize().await;
        assert_eq!(node.successor_vec(), vec![node.address().clone()]);
        assert_eq!(node.predecessor(), Some(node.address().clone()));
        // further rounds are stable
        node.stabilize().await;
        assert_eq!(node.successor_vec(), vec![node.address().clone()]);
    }

    #[tokio::test]
    async fn singleton_fix_fingers_terminates_every_finger_at_self() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.create().unwrap();
        node.fix_fingers().await;
        let summary = node.summary();
        assert_eq!(summary.fingers.len(), RING_BITS as usize);
        for finger in summary.fingers {
            assert_eq!(&finger.address, node.address());
        }
    }

    #[tokio::test]
    async fn singleton_resolves_every_key_to_itself() {
        let node = Node::new("127.0.0.1:4600".to_string(), 3);
        node.create().unwrap();
        let owner = node.lookup("some-file.txt").await.unwrap();
        assert_eq!(&owner, node.address());

        let owner = node.store("some-file.txt", b"content".to_vec()).await.unwrap();
        assert_eq!(&owner, node.address());
        assert_eq!(
            node.retrieve("some-file.txt").await.unwrap(),
            b"content".to_vec()
        );
        assert!(matches!(
            node.retrieve("missing.txt").await,
            Err(NodeError::KeyAbsent(_))
        ));
    }
}
