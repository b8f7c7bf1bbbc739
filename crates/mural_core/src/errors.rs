//! Error Types
//!
//! This module defines the error types used throughout the cluster sync stack.
//!
//! # Overview
//!
//! The main error type [`MuralError`] covers every failure mode of resource
//! synchronization:
//! - Local resource construction failures
//! - Bounded waits that elapsed without the resource appearing
//! - Protocol anomalies on the wire (see [`ProtocolViolation`])
//! - Duplicate staging of network payloads
//!
//! Construction errors are fatal to the single call that triggered them.
//! Protocol anomalies are recovered locally: the receive path logs them, drops
//! the message, and keeps the cluster rendering.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mural_core::errors::{MuralError, Result};
//!
//! fn load() -> Result<()> {
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::kind::ResourceKind;
use crate::node::{NodeId, NodeRole};

/// The main error type for Mural.
#[derive(Error, Debug)]
pub enum MuralError {
    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Constructing a resource from its source failed.
    ///
    /// The cache entry is never inserted when this is returned.
    #[error("Failed to load resource '{name}': {description}")]
    ResourceLoad {
        /// Name of the resource being constructed
        name: String,
        /// Loader-provided failure description
        description: String,
    },

    /// A bounded wait for a resource elapsed.
    #[error("Timed out after {timeout:?} waiting for resource '{name}'")]
    ResourceTimeout {
        /// Name of the resource being waited for
        name: String,
        /// The bound that elapsed
        timeout: Duration,
    },

    /// A second payload was staged for an identity that is still pending.
    #[error("Resource {kind:?} '{name}' is already staged; duplicate discarded")]
    DuplicateResourceStaged {
        /// Kind of the duplicate payload
        kind: ResourceKind,
        /// Name of the duplicate payload
        name: String,
    },

    /// No cache has been registered for this resource kind.
    #[error("No resource cache registered for kind {0:?}")]
    NoCacheForKind(ResourceKind),

    // ========================================================================
    // Protocol & Transport Errors
    // ========================================================================
    /// A message or operation broke the cluster protocol.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The transport refused or failed to enqueue a send.
    #[error("Transport error: {0}")]
    Transport(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MuralError {
    /// Shorthand for a [`MuralError::ResourceLoad`].
    pub fn load(name: impl Into<String>, description: impl ToString) -> Self {
        Self::ResourceLoad {
            name: name.into(),
            description: description.to_string(),
        }
    }

    /// Returns `true` for errors the receive path recovers from locally.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::DuplicateResourceStaged { .. } | Self::NoCacheForKind(_)
        )
    }
}

/// Ways a node or a message can break the coordinator/worker protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The operation is reserved for the other node role.
    #[error("'{operation}' is not permitted on a {role:?} node")]
    WrongRole {
        operation: &'static str,
        role: NodeRole,
    },

    /// Only coordinator <-> worker links exist.
    #[error("No link between {from} and {to}: only coordinator<->worker transfers exist")]
    TopologyViolation { from: NodeId, to: NodeId },

    /// The message type byte does not name an internal message.
    #[error("Unknown internal message type byte {byte:#04x}")]
    UnknownMessageType { byte: u8 },

    /// The kind byte does not name a resource kind.
    #[error("Unknown resource kind byte {byte:#04x}")]
    UnknownResourceKind { byte: u8 },

    /// A ResourceTransfer body could not be framed.
    #[error("Malformed resource transfer of {len} bytes: {reason}")]
    MalformedTransfer { len: usize, reason: &'static str },

    /// A resource name on the wire was empty, too long or not UTF-8.
    #[error("Invalid resource name: {reason}")]
    InvalidResourceName { reason: &'static str },

    /// The user id collides with the user-data sentinel.
    #[error("User id 0xffff is reserved for user data")]
    ReservedUserId,

    /// `AllResources` appeared where a concrete kind is required.
    #[error("The AllResources wildcard is only valid in resource requests")]
    UnexpectedWildcard,
}

/// Alias for `Result<T, MuralError>`.
pub type Result<T> = std::result::Result<T, MuralError>;
