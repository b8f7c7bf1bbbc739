//! Mural Core
//!
//! Foundational types shared by every Mural crate:
//!
//! - [`package`]: the 32-bit package id codec that multiplexes internal sync
//!   traffic and application payloads over a single transport channel
//! - [`ResourceKind`] / [`InternalMessageType`]: the tags carried in a package id
//! - [`NodeRole`] / [`ClusterIdentity`]: the coordinator/worker asymmetry
//! - [`errors`]: the crate-wide error taxonomy
//! - [`SyncSettings`]: tunables for the sync layer

pub mod errors;
pub mod kind;
pub mod node;
pub mod package;
pub mod settings;

pub use errors::{MuralError, ProtocolViolation, Result};
pub use kind::{InternalMessageType, ResourceKind};
pub use node::{ClusterIdentity, NodeId, NodeRole};
pub use package::{PackageId, UserId, USER_DATA_SENTINEL};
pub use settings::SyncSettings;
