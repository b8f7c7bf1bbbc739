//! Sync Coordinator
//!
//! Role-aware orchestration of resource synchronization. Every node runs one
//! [`SyncCoordinator`]; what it may do depends on its [`NodeRole`]:
//!
//! | Operation                         | Coordinator | Worker |
//! |-----------------------------------|-------------|--------|
//! | request a resource                | ❌          | ✅     |
//! | serve requests / push transfers   | ✅          | ❌     |
//! | receive transfers and releases    | ❌          | ✅     |
//! | release a shared resource         | ✅ (broadcast) | ✅ (local) |
//!
//! # Worker state machine
//!
//! Per `(kind, name)`, as observed on a worker:
//!
//! ```text
//! Unknown --request--> Requested --transfer--> Pending --frame apply--> Materialized
//!    ^                                                                      |
//!    +------------------------- release (from any state) -------------------+
//! ```
//!
//! The coordinator queues incoming requests and serves them at its next frame
//! boundary, so local loads also happen on the render thread. A request it
//! cannot satisfy is logged and never answered; the requester only learns of
//! the failure through its wait timing out, which also clears the request so
//! it can be sent again.
//!
//! Workers queue received releases the same way. The staged payload and the
//! outstanding request are dropped on receipt, but the live instance stays
//! until the next frame boundary evicts it on the render thread.
//!
//! # Threading
//!
//! [`on_data_received`](SyncCoordinator::on_data_received) may run on the
//! transport's I/O thread. [`on_frame_boundary`](SyncCoordinator::on_frame_boundary)
//! must run on the render thread.
//! [`wait_for_resource`](SyncCoordinator::wait_for_resource) must *not* run on
//! the render thread, since the frame apply it waits for happens there.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use mural_core::errors::{MuralError, Result};
use mural_core::{
    ClusterIdentity, InternalMessageType, NodeId, NodeRole, PackageId, ProtocolViolation,
    ResourceKind, SyncSettings,
};
use mural_resources::CacheRegistry;

use crate::gate::{ApplyReport, FrameApplyGate};
use crate::pending::{PendingResourceTable, ResourceKey};
use crate::stats::{SyncStats, SyncStatsSnapshot};
use crate::transport::Transport;
use crate::wire;

/// Callback for application payloads on a user channel.
pub type UserDataHandler = Arc<dyn Fn(&[u8], NodeId) + Send + Sync>;

/// Where a resource stands on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Never requested, or released since.
    Unknown,
    /// A request is on its way to the coordinator.
    Requested,
    /// Bytes arrived and wait for the next frame apply.
    Pending,
    /// Live in the cache.
    Materialized,
}

/// A request waiting for the coordinator's next frame boundary.
#[derive(Debug, Clone)]
struct QueuedRequest {
    kind: ResourceKind,
    name: String,
    requester: NodeId,
}

/// Result of one [`SyncCoordinator::on_frame_boundary`] call.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub apply: ApplyReport,
    pub requests_served: usize,
    pub requests_unanswered: usize,
}

/// Per-node orchestrator of the request → transfer → apply protocol.
pub struct SyncCoordinator {
    identity: ClusterIdentity,
    settings: SyncSettings,
    transport: Arc<dyn Transport>,
    caches: CacheRegistry,
    pending: Arc<PendingResourceTable>,
    gate: FrameApplyGate,
    outstanding: Mutex<FxHashMap<ResourceKey, u32>>,
    request_queue: Mutex<Vec<QueuedRequest>>,
    user_channels: RwLock<FxHashMap<u16, UserDataHandler>>,
    stats: SyncStats,
}

impl SyncCoordinator {
    pub fn new(
        identity: ClusterIdentity,
        settings: SyncSettings,
        transport: Arc<dyn Transport>,
        caches: CacheRegistry,
    ) -> Self {
        let pending = Arc::new(PendingResourceTable::new());
        let gate = FrameApplyGate::new(Arc::clone(&pending), caches.clone());
        info!(
            "{} starting as {:?} (coordinator is {})",
            identity.node, identity.role, identity.coordinator
        );
        Self {
            identity,
            settings,
            transport,
            caches,
            pending,
            gate,
            outstanding: Mutex::new(FxHashMap::default()),
            request_queue: Mutex::new(Vec::new()),
            user_channels: RwLock::new(FxHashMap::default()),
            stats: SyncStats::default(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn identity(&self) -> ClusterIdentity {
        self.identity
    }

    #[inline]
    #[must_use]
    pub fn role(&self) -> NodeRole {
        self.identity.role
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    #[inline]
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingResourceTable> {
        &self.pending
    }

    #[must_use]
    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn has_resource(&self, kind: ResourceKind, name: &str) -> bool {
        self.caches
            .get(kind)
            .is_ok_and(|cache| cache.has_resource(name))
    }

    #[must_use]
    pub fn resource_state(&self, kind: ResourceKind, name: &str) -> SyncState {
        if self.has_resource(kind, name) {
            SyncState::Materialized
        } else if self.pending.contains(kind, name) {
            SyncState::Pending
        } else if self
            .outstanding
            .lock()
            .contains_key(&ResourceKey::new(kind, name))
        {
            SyncState::Requested
        } else {
            SyncState::Unknown
        }
    }

    /// Blocks until the resource is live, bounded by the configured
    /// `wait_timeout`.
    pub fn wait_for_resource(&self, kind: ResourceKind, name: &str) -> Result<()> {
        self.wait_for_resource_timeout(kind, name, self.settings.wait_timeout)
    }

    /// Blocks until the resource is live or `timeout` elapses.
    ///
    /// A timeout forgets the outstanding request, so a later
    /// [`request_shared_resource`](Self::request_shared_resource) sends again.
    pub fn wait_for_resource_timeout(
        &self,
        kind: ResourceKind,
        name: &str,
        timeout: Duration,
    ) -> Result<()> {
        let result = self.caches.get(kind)?.wait_until_available(name, timeout);
        if matches!(result, Err(MuralError::ResourceTimeout { .. }))
            && self
                .outstanding
                .lock()
                .remove(&ResourceKey::new(kind, name))
                .is_some()
        {
            debug!("{} '{name}' unanswered, request dropped", kind.label());
        }
        result
    }

    // ========================================================================
    // Worker Operations
    // ========================================================================

    /// Asks the coordinator for a resource.
    ///
    /// An empty `name` asks for every resource of `kind`;
    /// [`ResourceKind::AllResources`] asks for everything. Returns `Ok(false)`
    /// without sending when the resource is already live, pending, or
    /// requested.
    pub fn request_shared_resource(&self, kind: ResourceKind, name: &str) -> Result<bool> {
        self.require_role(NodeRole::Worker, "request shared resource")?;
        if name.len() > self.settings.max_name_length {
            return Err(self.violation(
                ProtocolViolation::InvalidResourceName { reason: "too long" },
                self.identity.node,
            ));
        }

        let name = if kind.is_wildcard() { "" } else { name };
        let key = ResourceKey::new(kind, name);
        if !name.is_empty() && self.resource_state(kind, name) != SyncState::Unknown {
            trace!("{key} already known, not requesting again");
            return Ok(false);
        }
        // Recorded before sending: on a threaded transport the transfer can
        // arrive before `send_request` returns.
        {
            let mut outstanding = self.outstanding.lock();
            if outstanding.contains_key(&key) {
                return Ok(false);
            }
            outstanding.insert(key.clone(), 1);
        }

        if let Err(e) = self.send_request(&key) {
            self.outstanding.lock().remove(&key);
            return Err(e);
        }
        Ok(true)
    }

    /// Asks the coordinator for every resource it has.
    pub fn request_all_resources(&self) -> Result<bool> {
        self.request_shared_resource(ResourceKind::AllResources, "")
    }

    fn send_request(&self, key: &ResourceKey) -> Result<()> {
        let package = PackageId::internal(InternalMessageType::ResourceRequest, key.kind);
        self.transport.send_to_node(
            key.name.as_bytes().to_vec(),
            package.to_raw(),
            self.identity.coordinator,
        )?;
        self.stats.add_requests_sent(1);
        debug!("Requested {key} from {}", self.identity.coordinator);
        Ok(())
    }

    // ========================================================================
    // Coordinator Operations
    // ========================================================================

    /// Sends one resource to `target`, loading it locally if needed.
    pub fn synchronize_resource_to_node(
        &self,
        kind: ResourceKind,
        name: &str,
        target: NodeId,
    ) -> Result<()> {
        self.require_role(NodeRole::Coordinator, "synchronize resource to node")?;
        self.require_concrete(kind)?;
        let payload = self.caches.get(kind)?.share_resource(name)?;
        self.send_transfer(kind, name, &payload, Some(target))
    }

    /// Sends every live resource of every kind to `target`. Returns how many
    /// transfers were enqueued.
    pub fn synchronize_all_resources_to_node(&self, target: NodeId) -> Result<usize> {
        self.require_role(NodeRole::Coordinator, "synchronize all resources to node")?;
        let mut sent = 0;
        for cache in self.caches.iter() {
            for (name, payload) in cache.live_payloads() {
                self.send_transfer(cache.kind(), &name, &payload, Some(target))?;
                sent += 1;
            }
        }
        info!("Synchronized {sent} resources to {target}");
        Ok(sent)
    }

    /// Pushes one resource to every worker.
    pub fn broadcast_resource(&self, kind: ResourceKind, name: &str) -> Result<()> {
        self.require_role(NodeRole::Coordinator, "broadcast resource")?;
        self.require_concrete(kind)?;
        let payload = self.caches.get(kind)?.share_resource(name)?;
        self.send_transfer(kind, name, &payload, None)
    }

    fn send_transfer(
        &self,
        kind: ResourceKind,
        name: &str,
        payload: &[u8],
        target: Option<NodeId>,
    ) -> Result<()> {
        let body = wire::encode_transfer(name, payload);
        let package = PackageId::internal(InternalMessageType::ResourceTransfer, kind).to_raw();
        match target {
            Some(node) => self.transport.send_to_node(body, package, node)?,
            None => self.transport.broadcast(body, package)?,
        }
        self.stats.add_transfers_sent(1);
        trace!(
            "Sent {} '{name}' ({} bytes) to {}",
            kind.label(),
            payload.len(),
            target.map_or_else(|| "all workers".to_string(), |n| n.to_string())
        );
        Ok(())
    }

    // ========================================================================
    // Shared Operations
    // ========================================================================

    /// Drops this node's ownership of a shared resource.
    ///
    /// On the coordinator the release is also broadcast, which makes every
    /// worker evict the resource.
    pub fn release_shared_resource(&self, kind: ResourceKind, name: &str) -> Result<bool> {
        self.require_concrete(kind)?;
        let released = self.caches.get(kind)?.release_shared_resource(name);

        if self.identity.is_coordinator() {
            let package =
                PackageId::internal(InternalMessageType::ResourceReleaseTransfer, kind).to_raw();
            self.transport.broadcast(name.as_bytes().to_vec(), package)?;
            self.stats.add_releases_sent(1);
            debug!("Broadcast release of {} '{name}'", kind.label());
        }
        Ok(released)
    }

    /// Registers the handler for an application channel, replacing any
    /// previous one.
    pub fn register_user_channel(&self, channel: u16, handler: UserDataHandler) {
        self.user_channels.write().insert(channel, handler);
    }

    pub fn unregister_user_channel(&self, channel: u16) -> bool {
        self.user_channels.write().remove(&channel).is_some()
    }

    /// Sends an opaque application payload. `None` broadcasts.
    pub fn send_user_data(&self, channel: u16, bytes: Vec<u8>, target: Option<NodeId>) -> Result<()> {
        let package = PackageId::user_channel(channel).to_raw();
        match target {
            Some(node) => self.transport.send_to_node(bytes, package, node),
            None => self.transport.broadcast(bytes, package),
        }
    }

    // ========================================================================
    // Collaborator Callbacks
    // ========================================================================

    /// Entry point for every inbound transport message.
    ///
    /// Protocol anomalies are logged, counted and dropped; the returned error
    /// only classifies what happened.
    pub fn on_data_received(&self, bytes: &[u8], package_id: u32, source: NodeId) -> Result<()> {
        let package = PackageId::from_raw(package_id).map_err(|v| self.violation(v, source))?;

        match package {
            PackageId::UserChannel(channel) => {
                self.dispatch_user_data(channel, bytes, source);
                Ok(())
            }
            PackageId::Internal { message, kind, .. } => match message {
                InternalMessageType::ResourceTransfer => self.receive_transfer(kind, bytes, source),
                InternalMessageType::ResourceRequest => self.receive_request(kind, bytes, source),
                InternalMessageType::ResourceReleaseTransfer => {
                    self.receive_release(kind, bytes, source)
                }
            },
        }
    }

    pub fn on_data_acknowledged(&self, package_id: u32, source: NodeId) {
        self.stats.add_acknowledgements(1);
        trace!("{source} acknowledged package {package_id:#010x}");
    }

    pub fn on_connection_status_changed(&self, connected: bool, node: NodeId) {
        info!(
            "{}: link to {node} {}",
            self.identity.node,
            if connected { "up" } else { "down" }
        );
        if !connected || node == self.identity.node {
            return;
        }

        match self.identity.role {
            NodeRole::Coordinator if self.settings.sync_on_connect => {
                if let Err(e) = self.synchronize_all_resources_to_node(node) {
                    warn!("Initial sync to {node} failed: {e}");
                }
            }
            NodeRole::Worker
                if node == self.identity.coordinator && self.settings.rerequest_on_reconnect =>
            {
                self.resend_outstanding();
            }
            _ => {}
        }
    }

    /// Applies staged resources and, on the coordinator, serves queued
    /// requests. Call once per frame on the render thread, before drawing.
    pub fn on_frame_boundary(&self) -> FrameReport {
        let apply = self.gate.apply_pending();
        self.stats.add_releases_applied(apply.released.len() as u64);
        self.stats.add_resources_applied(apply.applied.len() as u64);
        self.stats.add_apply_failures(apply.failed.len() as u64);

        let mut report = FrameReport {
            apply,
            ..FrameReport::default()
        };
        if report.apply.refused {
            return report;
        }

        let queued = std::mem::take(&mut *self.request_queue.lock());
        for request in queued {
            if self.serve_request(&request) {
                report.requests_served += 1;
            } else {
                report.requests_unanswered += 1;
            }
        }
        report
    }

    // ========================================================================
    // Receive Paths
    // ========================================================================

    fn receive_transfer(&self, kind: ResourceKind, bytes: &[u8], source: NodeId) -> Result<()> {
        if self.identity.is_coordinator() {
            return Err(self.violation(
                ProtocolViolation::WrongRole {
                    operation: "receive resource transfer",
                    role: self.identity.role,
                },
                source,
            ));
        }
        self.require_from_coordinator(source)?;
        if kind.is_wildcard() {
            return Err(self.violation(ProtocolViolation::UnexpectedWildcard, source));
        }

        let (name, payload) = wire::decode_transfer(bytes, self.settings.max_name_length)
            .map_err(|v| self.violation(v, source))?;

        if !self.pending.stage(kind, name, payload.to_vec()) {
            self.stats.add_duplicates_discarded(1);
            return Err(MuralError::DuplicateResourceStaged {
                kind,
                name: name.to_string(),
            });
        }

        self.stats.add_transfers_staged(1);
        {
            // Any transfer also answers the bulk requests that cover it.
            let mut outstanding = self.outstanding.lock();
            outstanding.remove(&ResourceKey::new(kind, name));
            outstanding.remove(&ResourceKey::new(kind, ""));
            outstanding.remove(&ResourceKey::new(ResourceKind::AllResources, ""));
        }
        trace!("Staged {} '{name}' ({} bytes) from {source}", kind.label(), payload.len());
        Ok(())
    }

    fn receive_request(&self, kind: ResourceKind, bytes: &[u8], source: NodeId) -> Result<()> {
        if !self.identity.is_coordinator() {
            return Err(self.violation(
                ProtocolViolation::WrongRole {
                    operation: "serve resource request",
                    role: self.identity.role,
                },
                source,
            ));
        }

        let name = wire::decode_name(bytes, self.settings.max_name_length)
            .map_err(|v| self.violation(v, source))?;
        debug!("{source} requested {} '{name}'", kind.label());
        self.request_queue.lock().push(QueuedRequest {
            kind,
            name: name.to_string(),
            requester: source,
        });
        Ok(())
    }

    fn receive_release(&self, kind: ResourceKind, bytes: &[u8], source: NodeId) -> Result<()> {
        if self.identity.is_coordinator() {
            return Err(self.violation(
                ProtocolViolation::WrongRole {
                    operation: "receive resource release",
                    role: self.identity.role,
                },
                source,
            ));
        }
        self.require_from_coordinator(source)?;
        if kind.is_wildcard() {
            return Err(self.violation(ProtocolViolation::UnexpectedWildcard, source));
        }

        let name = wire::decode_name(bytes, self.settings.max_name_length)
            .map_err(|v| self.violation(v, source))?;
        if name.is_empty() {
            return Err(self.violation(
                ProtocolViolation::InvalidResourceName { reason: "empty" },
                source,
            ));
        }

        let discarded = self.pending.queue_release(kind, name);
        self.outstanding.lock().remove(&ResourceKey::new(kind, name));
        debug!(
            "Release of {} '{name}' queued for the next frame (pending discarded: {discarded})",
            kind.label()
        );
        Ok(())
    }

    // ========================================================================
    // Serving
    // ========================================================================

    /// Returns `false` when nothing could be sent.
    fn serve_request(&self, request: &QueuedRequest) -> bool {
        let result = if request.kind.is_wildcard() || request.name.is_empty() {
            self.serve_bulk(request)
        } else {
            self.serve_single(request)
        };

        match result {
            Ok(()) => {
                self.stats.add_requests_served(1);
                true
            }
            Err(e) => {
                self.stats.add_requests_unanswered(1);
                warn!(
                    "Cannot serve {} '{}' to {}: {e}",
                    request.kind.label(),
                    request.name,
                    request.requester
                );
                false
            }
        }
    }

    fn serve_single(&self, request: &QueuedRequest) -> Result<()> {
        let payload = self.caches.get(request.kind)?.share_resource(&request.name)?;
        self.send_transfer(request.kind, &request.name, &payload, Some(request.requester))
    }

    fn serve_bulk(&self, request: &QueuedRequest) -> Result<()> {
        let target = if self.settings.broadcast_bulk_replies {
            None
        } else {
            Some(request.requester)
        };

        let kinds: Vec<ResourceKind> = if request.kind.is_wildcard() {
            self.caches.iter().map(|cache| cache.kind()).collect()
        } else {
            vec![self.caches.get(request.kind)?.kind()]
        };

        for kind in kinds {
            for (name, payload) in self.caches.get(kind)?.live_payloads() {
                self.send_transfer(kind, &name, &payload, target)?;
            }
        }
        Ok(())
    }

    fn resend_outstanding(&self) {
        // The lock is not held across sends; a transport may deliver the
        // reply synchronously into `receive_transfer`.
        let keys: Vec<ResourceKey> = self.outstanding.lock().keys().cloned().collect();
        for key in keys {
            match self.send_request(&key) {
                Ok(()) => {
                    if let Some(attempts) = self.outstanding.lock().get_mut(&key) {
                        *attempts += 1;
                    }
                }
                Err(e) => warn!("Re-request of {key} failed: {e}"),
            }
        }
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn require_role(&self, role: NodeRole, operation: &'static str) -> Result<()> {
        if self.identity.role == role {
            return Ok(());
        }
        Err(self.violation(
            ProtocolViolation::WrongRole {
                operation,
                role: self.identity.role,
            },
            self.identity.node,
        ))
    }

    fn require_concrete(&self, kind: ResourceKind) -> Result<()> {
        if kind.is_wildcard() {
            return Err(self.violation(ProtocolViolation::UnexpectedWildcard, self.identity.node));
        }
        Ok(())
    }

    fn require_from_coordinator(&self, source: NodeId) -> Result<()> {
        if source == self.identity.coordinator {
            return Ok(());
        }
        Err(self.violation(
            ProtocolViolation::TopologyViolation {
                from: source,
                to: self.identity.node,
            },
            source,
        ))
    }

    fn violation(&self, violation: ProtocolViolation, source: NodeId) -> MuralError {
        self.stats.add_protocol_violations(1);
        warn!("{}: protocol violation ({source}): {violation}", self.identity.node);
        MuralError::Protocol(violation)
    }

    fn dispatch_user_data(&self, channel: u16, bytes: &[u8], source: NodeId) {
        self.stats.add_user_messages_received(1);
        let handler = self.user_channels.read().get(&channel).cloned();
        match handler {
            Some(handler) => handler(bytes, source),
            None => debug!(
                "No handler for user channel {channel}; {} bytes from {source} dropped",
                bytes.len()
            ),
        }
    }
}
