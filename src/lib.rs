#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Mural
//!
//! Resource synchronization for multi-machine rendering clusters. One
//! coordinator owns the authoritative resources; workers request them by
//! name, receive the bytes over the cluster transport and materialize them at
//! their next frame boundary.
//!
//! - [`package`] / [`errors`]: package ids, resource kinds, node roles and errors
//! - [`resources`]: per-kind weak-reference caches and loaders
//! - [`sync`]: the coordinator, pending table, frame apply gate and transports
//! - [`ClusterNode`]: all of the above wired together for one machine

pub mod node;

pub use mural_resources as resources;
pub use mural_sync as sync;

pub use mural_core::{errors, package};
pub use mural_core::{
    ClusterIdentity, InternalMessageType, MuralError, NodeId, NodeRole, PackageId,
    ProtocolViolation, ResourceKind, Result, SyncSettings,
};
pub use mural_resources::{ResourceCache, ResourceHandle, ResourceLoader};
pub use mural_sync::{FrameReport, SyncCoordinator, SyncState, Transport};
pub use node::{ClusterNode, NodeLoaders};
