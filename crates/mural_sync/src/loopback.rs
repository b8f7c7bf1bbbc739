//! In-process cluster transport.
//!
//! [`LoopbackCluster`] wires one coordinator and any number of workers
//! together with `flume` channels in a star topology: the coordinator is
//! linked to every worker, each worker only to the coordinator. Sends along a
//! link that does not exist are refused, which mirrors what the real cluster
//! engine does.
//!
//! Delivery is explicit: each node calls [`LoopbackEndpoint::pump`] when it
//! wants its inbox dispatched, which makes multi-node scenarios deterministic
//! to drive from a single test thread.

use flume::{Receiver, Sender};
use log::trace;
use rustc_hash::FxHashMap;

use mural_core::errors::{MuralError, Result};
use mural_core::{NodeId, ProtocolViolation};

use crate::coordinator::SyncCoordinator;
use crate::transport::{Envelope, Transport};

/// What travels over a loopback link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMessage {
    Data(Envelope),
    /// Delivery receipt for a previously sent message.
    Ack { package_id: u32, source: NodeId },
}

/// Factory for the endpoints of an in-process cluster.
pub struct LoopbackCluster {
    coordinator: NodeId,
    inboxes: FxHashMap<NodeId, (Sender<LinkMessage>, Receiver<LinkMessage>)>,
}

impl LoopbackCluster {
    pub fn new(coordinator: NodeId, workers: impl IntoIterator<Item = NodeId>) -> Self {
        let mut inboxes = FxHashMap::default();
        inboxes.insert(coordinator, flume::unbounded());
        for worker in workers {
            inboxes.insert(worker, flume::unbounded());
        }
        Self {
            coordinator,
            inboxes,
        }
    }

    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> NodeId {
        self.coordinator
    }

    /// Every node in the cluster, sorted.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.inboxes.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Builds the endpoint for `node`, or `None` if it is not a member.
    #[must_use]
    pub fn endpoint(&self, node: NodeId) -> Option<LoopbackEndpoint> {
        let (_, inbox) = self.inboxes.get(&node)?;

        let peers = self
            .inboxes
            .iter()
            .filter(|(peer, _)| {
                **peer != node && (node == self.coordinator || **peer == self.coordinator)
            })
            .map(|(peer, (tx, _))| (*peer, tx.clone()))
            .collect();

        Some(LoopbackEndpoint {
            node,
            peers,
            inbox: inbox.clone(),
        })
    }
}

/// One node's view of the loopback cluster.
pub struct LoopbackEndpoint {
    node: NodeId,
    peers: FxHashMap<NodeId, Sender<LinkMessage>>,
    inbox: Receiver<LinkMessage>,
}

impl LoopbackEndpoint {
    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Nodes this endpoint has a link to, sorted.
    #[must_use]
    pub fn peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.peers.keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    /// Number of undelivered messages waiting in this node's inbox.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inbox.len()
    }

    /// Takes the next inbox message without dispatching it.
    #[must_use]
    pub fn try_recv(&self) -> Option<LinkMessage> {
        self.inbox.try_recv().ok()
    }

    /// Dispatches every queued message into `sync` and acknowledges data
    /// messages back to their sender. Returns how many messages were handled.
    pub fn pump(&self, sync: &SyncCoordinator) -> usize {
        let mut handled = 0;
        for message in self.inbox.try_iter() {
            handled += 1;
            match message {
                LinkMessage::Data(envelope) => {
                    if let Err(e) =
                        sync.on_data_received(&envelope.bytes, envelope.package_id, envelope.source)
                    {
                        trace!("{} dropped message from {}: {e}", self.node, envelope.source);
                    }
                    if let Some(peer) = self.peers.get(&envelope.source) {
                        // A closed peer is not an error for the receiver.
                        let _ = peer.send(LinkMessage::Ack {
                            package_id: envelope.package_id,
                            source: self.node,
                        });
                    }
                }
                LinkMessage::Ack { package_id, source } => {
                    sync.on_data_acknowledged(package_id, source);
                }
            }
        }
        handled
    }

    fn deliver(&self, peer: NodeId, tx: &Sender<LinkMessage>, bytes: Vec<u8>, package_id: u32) -> Result<()> {
        tx.send(LinkMessage::Data(Envelope {
            source: self.node,
            package_id,
            bytes,
        }))
        .map_err(|_| MuralError::Transport(format!("link {} -> {peer} is closed", self.node)))
    }
}

impl Transport for LoopbackEndpoint {
    fn send_to_node(&self, bytes: Vec<u8>, package_id: u32, node: NodeId) -> Result<()> {
        let tx = self.peers.get(&node).ok_or(ProtocolViolation::TopologyViolation {
            from: self.node,
            to: node,
        })?;
        self.deliver(node, tx, bytes, package_id)
    }

    fn broadcast(&self, bytes: Vec<u8>, package_id: u32) -> Result<()> {
        for peer in self.peers() {
            if let Some(tx) = self.peers.get(&peer) {
                self.deliver(peer, tx, bytes.clone(), package_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> LoopbackCluster {
        LoopbackCluster::new(NodeId(0), [NodeId(1), NodeId(2)])
    }

    #[test]
    fn star_topology() {
        let cluster = cluster();
        assert_eq!(
            cluster.endpoint(NodeId(0)).unwrap().peers(),
            vec![NodeId(1), NodeId(2)]
        );
        assert_eq!(cluster.endpoint(NodeId(1)).unwrap().peers(), vec![NodeId(0)]);
        assert!(cluster.endpoint(NodeId(7)).is_none());
    }

    #[test]
    fn worker_to_worker_is_refused() {
        let cluster = cluster();
        let one = cluster.endpoint(NodeId(1)).unwrap();
        let two = cluster.endpoint(NodeId(2)).unwrap();

        let err = one.send_to_node(vec![1], 0, NodeId(2)).unwrap_err();
        assert!(matches!(
            err,
            MuralError::Protocol(ProtocolViolation::TopologyViolation { .. })
        ));
        assert_eq!(two.queued(), 0);
    }

    #[test]
    fn broadcast_reaches_every_worker() {
        let cluster = cluster();
        let coordinator = cluster.endpoint(NodeId(0)).unwrap();
        coordinator.broadcast(vec![7], 42).unwrap();

        for worker in [NodeId(1), NodeId(2)] {
            let endpoint = cluster.endpoint(worker).unwrap();
            assert_eq!(
                endpoint.try_recv(),
                Some(LinkMessage::Data(Envelope {
                    source: NodeId(0),
                    package_id: 42,
                    bytes: vec![7],
                }))
            );
        }
    }
}
