//! Frame Apply Gate
//!
//! The single point where received payloads become live resources. It runs
//! once per frame, before any draw callback, on the thread that owns the GPU
//! context. Turning bytes into GPU objects anywhere else would break context
//! affinity and let caches change in the middle of a frame.
//!
//! Queued releases are evicted here as well, before the staged payloads of the
//! same drain are applied. Eviction drops the cache's owning reference, so it
//! belongs on the thread that owns the GPU context.
//!
//! The gate binds itself to the first thread that calls
//! [`apply_pending`](FrameApplyGate::apply_pending). Calls from any other
//! thread are refused and leave the staged entries in place.

use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use log::{debug, error};

use mural_core::MuralError;
use mural_resources::CacheRegistry;

use crate::pending::{PendingResourceTable, ResourceKey};

/// Outcome of one [`FrameApplyGate::apply_pending`] call.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Releases processed this frame, whether or not anything was live.
    pub released: Vec<ResourceKey>,
    /// Newly materialized resources.
    pub applied: Vec<ResourceKey>,
    /// Entries whose name was already live; nothing was constructed.
    pub skipped: Vec<ResourceKey>,
    /// Entries that could not be materialized, and why.
    pub failed: Vec<(ResourceKey, MuralError)>,
    /// The call came from a thread other than the render thread.
    pub refused: bool,
}

impl ApplyReport {
    /// Total entries drained this frame.
    #[must_use]
    pub fn drained(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drained() == 0 && self.released.is_empty()
    }
}

/// Drains the pending table into the per-kind caches.
pub struct FrameApplyGate {
    pending: Arc<PendingResourceTable>,
    caches: CacheRegistry,
    render_thread: OnceLock<ThreadId>,
}

impl FrameApplyGate {
    #[must_use]
    pub fn new(pending: Arc<PendingResourceTable>, caches: CacheRegistry) -> Self {
        Self {
            pending,
            caches,
            render_thread: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &Arc<PendingResourceTable> {
        &self.pending
    }

    /// The thread this gate is bound to, once the first frame has run.
    #[must_use]
    pub fn render_thread(&self) -> Option<ThreadId> {
        self.render_thread.get().copied()
    }

    /// Evicts released resources, then materializes every staged one. Call
    /// exactly once per frame.
    pub fn apply_pending(&self) -> ApplyReport {
        let current = thread::current().id();
        let owner = *self.render_thread.get_or_init(|| current);
        if owner != current {
            error!(
                "apply_pending called from {current:?}, but the render thread is {owner:?}; \
                 leaving {} entries and {} releases queued",
                self.pending.len(),
                self.pending.queued_releases()
            );
            return ApplyReport {
                refused: true,
                ..ApplyReport::default()
            };
        }

        let drain = self.pending.drain_frame();
        let mut report = ApplyReport::default();

        for key in drain.releases {
            let evicted = self
                .caches
                .get(key.kind)
                .is_ok_and(|cache| cache.evict(&key.name));
            debug!("Released {key} (evicted: {evicted})");
            report.released.push(key);
        }

        for entry in drain.entries {
            let key = entry.key();
            let result = self
                .caches
                .get(entry.kind)
                .and_then(|cache| cache.create_shared_resource(&entry.name, &entry.payload));

            match result {
                Ok(true) => report.applied.push(key),
                Ok(false) => report.skipped.push(key),
                Err(e) => {
                    error!("Failed to materialize {key}: {e}");
                    report.failed.push((key, e));
                }
            }
        }

        if !report.is_empty() {
            debug!(
                "Frame apply: {} released, {} applied, {} skipped, {} failed",
                report.released.len(),
                report.applied.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        report
    }
}
