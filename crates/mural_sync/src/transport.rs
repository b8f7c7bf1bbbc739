//! Transport seam.
//!
//! The cluster engine owns the real network. Mural only needs to enqueue
//! sends, addressed to one node or broadcast to every connected node.

use mural_core::errors::Result;
use mural_core::NodeId;

/// Outbound side of the cluster engine's network.
pub trait Transport: Send + Sync {
    /// Enqueues `bytes` for a single node.
    fn send_to_node(&self, bytes: Vec<u8>, package_id: u32, node: NodeId) -> Result<()>;

    /// Enqueues `bytes` for every node this one is linked to.
    fn broadcast(&self, bytes: Vec<u8>, package_id: u32) -> Result<()>;
}

/// A message as it arrives at the receiving node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub source: NodeId,
    pub package_id: u32,
    pub bytes: Vec<u8>,
}
