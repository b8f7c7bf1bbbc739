//! Sync Settings
//!
//! Tunables for the resource synchronization layer. The struct derives serde
//! so hosts can embed it in whatever cluster configuration format they load.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mural_core::SyncSettings;
//! use std::time::Duration;
//!
//! let settings = SyncSettings {
//!     wait_timeout: Duration::from_millis(500),
//!     sync_on_connect: false,
//!     ..Default::default()
//! };
//! ```
//!
//! | Field                    | Default | Affects                                          |
//! |--------------------------|---------|--------------------------------------------------|
//! | `wait_timeout`           | 5 s     | default bound of `wait_for_resource`             |
//! | `sync_on_connect`        | `true`  | coordinator pushes its cache to joining workers  |
//! | `broadcast_bulk_replies` | `true`  | wildcard requests are answered by broadcast      |
//! | `rerequest_on_reconnect` | `true`  | workers resend outstanding requests on reconnect |
//! | `max_name_length`        | 1024    | longest resource name accepted from the wire     |

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a node's sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Default bound for blocking waits on a resource.
    pub wait_timeout: Duration,

    /// When a worker connects, the coordinator sends it every resource it
    /// currently caches.
    pub sync_on_connect: bool,

    /// Requests for a whole kind (or [`AllResources`]) are answered with a
    /// broadcast. When `false` only the requester receives the reply.
    ///
    /// [`AllResources`]: crate::ResourceKind::AllResources
    pub broadcast_bulk_replies: bool,

    /// A worker whose coordinator link comes back resends every request that
    /// has not been answered yet.
    pub rerequest_on_reconnect: bool,

    /// Names longer than this (in bytes) are rejected as protocol violations.
    pub max_name_length: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            sync_on_connect: true,
            broadcast_bulk_replies: true,
            rerequest_on_reconnect: true,
            max_name_length: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{ "sync_on_connect": false }"#).unwrap();
        assert!(!settings.sync_on_connect);
        assert_eq!(settings.wait_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_name_length, 1024);
    }
}
