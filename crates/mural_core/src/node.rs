use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a node in the cluster, as the transport addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Whether this process originates resources or consumes them.
///
/// This is fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Coordinator,
    Worker,
}

impl NodeRole {
    #[inline]
    #[must_use]
    pub fn is_coordinator(self) -> bool {
        matches!(self, Self::Coordinator)
    }
}

/// Who this process is and where the coordinator lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub role: NodeRole,
    pub node: NodeId,
    pub coordinator: NodeId,
}

impl ClusterIdentity {
    #[must_use]
    pub fn coordinator(node: NodeId) -> Self {
        Self {
            role: NodeRole::Coordinator,
            node,
            coordinator: node,
        }
    }

    #[must_use]
    pub fn worker(node: NodeId, coordinator: NodeId) -> Self {
        Self {
            role: NodeRole::Worker,
            node,
            coordinator,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.role.is_coordinator()
    }
}
