//! Staging area for received-but-not-yet-materialized resources.
//!
//! Network callbacks [`stage`](PendingResourceTable::stage) payloads, possibly
//! from an I/O thread; the render thread [`drain_frame`](PendingResourceTable::drain_frame)s
//! once per frame. A single mutex guards the table and no work happens while
//! it is held beyond the insert or the swap.
//!
//! Releases are queued here too. Evicting drops the last owner of a GPU
//! object, so it must happen on the render thread, never in the callback that
//! received the release.

use std::fmt;

use log::warn;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use mural_core::ResourceKind;

/// Identity of a synchronized resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.label(), self.name)
    }
}

/// Bytes received for a resource that has not been materialized yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResource {
    pub kind: ResourceKind,
    pub name: String,
    pub payload: Vec<u8>,
}

impl PendingResource {
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, self.name.clone())
    }
}

/// Everything one frame apply takes out of the table.
#[derive(Debug, Default)]
pub struct FrameDrain {
    /// Releases to evict, applied before `entries`.
    pub releases: Vec<ResourceKey>,
    pub entries: Vec<PendingResource>,
}

#[derive(Default)]
struct PendingInner {
    entries: Vec<PendingResource>,
    staged: FxHashSet<ResourceKey>,
    releases: Vec<ResourceKey>,
}

/// Thread-safe staging table keyed by `(kind, name)`.
#[derive(Default)]
pub struct PendingResourceTable {
    inner: Mutex<PendingInner>,
}

impl PendingResourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a payload unless the same identity is already waiting.
    ///
    /// Duplicates are logged and discarded; the first copy is kept.
    pub fn stage(&self, kind: ResourceKind, name: &str, payload: Vec<u8>) -> bool {
        let key = ResourceKey::new(kind, name);
        let entry = PendingResource {
            kind,
            name: key.name.clone(),
            payload,
        };

        let staged = {
            let mut guard = self.inner.lock();
            if guard.staged.insert(key) {
                guard.entries.push(entry);
                true
            } else {
                false
            }
        };

        if !staged {
            warn!("Duplicate {} '{name}' staged before apply, discarding", kind.label());
        }
        staged
    }

    /// Removes and returns every staged entry, in staging order.
    pub fn drain_all(&self) -> Vec<PendingResource> {
        let mut guard = self.inner.lock();
        guard.staged.clear();
        std::mem::take(&mut guard.entries)
    }

    /// Takes the queued releases and the staged entries in one swap.
    ///
    /// Anything that arrives afterwards belongs to the next frame, so a
    /// release never overtakes a transfer it was sent after.
    pub fn drain_frame(&self) -> FrameDrain {
        let mut guard = self.inner.lock();
        guard.staged.clear();
        FrameDrain {
            releases: std::mem::take(&mut guard.releases),
            entries: std::mem::take(&mut guard.entries),
        }
    }

    /// Discards any staged payload for the resource and queues its eviction
    /// for the next frame apply. Returns whether a staged payload was dropped.
    pub fn queue_release(&self, kind: ResourceKind, name: &str) -> bool {
        let key = ResourceKey::new(kind, name);
        let mut guard = self.inner.lock();
        let discarded = guard.staged.remove(&key);
        if discarded {
            guard.entries.retain(|e| !(e.kind == kind && e.name == name));
        }
        if !guard.releases.contains(&key) {
            guard.releases.push(key);
        }
        discarded
    }

    /// Whether an eviction is queued for the resource.
    #[must_use]
    pub fn release_queued(&self, kind: ResourceKind, name: &str) -> bool {
        self.inner
            .lock()
            .releases
            .contains(&ResourceKey::new(kind, name))
    }

    #[must_use]
    pub fn queued_releases(&self) -> usize {
        self.inner.lock().releases.len()
    }

    /// Drops a staged entry without applying it.
    pub fn discard(&self, kind: ResourceKind, name: &str) -> bool {
        let key = ResourceKey::new(kind, name);
        let mut guard = self.inner.lock();
        if !guard.staged.remove(&key) {
            return false;
        }
        guard.entries.retain(|e| !(e.kind == kind && e.name == name));
        true
    }

    #[must_use]
    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.inner
            .lock()
            .staged
            .contains(&ResourceKey::new(kind, name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
