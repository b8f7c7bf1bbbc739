//! Type-erased access to per-kind caches.
//!
//! The sync layer routes by [`ResourceKind`] and never knows the concrete
//! resource type, so every [`ResourceCache`] is also usable as a
//! `dyn SharedCache`.

use std::sync::Arc;
use std::time::Duration;

use mural_core::errors::{MuralError, Result};
use mural_core::ResourceKind;

use crate::cache::ResourceCache;
use crate::resource::SharedResource;

/// Operations the sync layer needs from a cache, independent of its type.
pub trait SharedCache: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn has_resource(&self, name: &str) -> bool;

    /// See [`ResourceCache::create_shared_resource`].
    fn create_shared_resource(&self, name: &str, bytes: &[u8]) -> Result<bool>;

    /// See [`ResourceCache::share_resource`].
    fn share_resource(&self, name: &str) -> Result<Vec<u8>>;

    /// `(name, payload)` for every live instance.
    fn live_payloads(&self) -> Vec<(String, Vec<u8>)>;

    fn release_shared_resource(&self, name: &str) -> bool;

    fn evict(&self, name: &str) -> bool;

    /// Blocks until `name` is live; see [`ResourceCache::wait_for_resource`].
    fn wait_until_available(&self, name: &str, timeout: Duration) -> Result<()>;
}

impl<T: SharedResource> SharedCache for ResourceCache<T> {
    fn kind(&self) -> ResourceKind {
        T::KIND
    }

    fn has_resource(&self, name: &str) -> bool {
        ResourceCache::has_resource(self, name)
    }

    fn create_shared_resource(&self, name: &str, bytes: &[u8]) -> Result<bool> {
        ResourceCache::create_shared_resource(self, name, bytes)
    }

    fn share_resource(&self, name: &str) -> Result<Vec<u8>> {
        ResourceCache::share_resource(self, name)
    }

    fn live_payloads(&self) -> Vec<(String, Vec<u8>)> {
        self.names()
            .into_iter()
            .filter_map(|name| self.payload_of(&name).map(|bytes| (name, bytes)))
            .collect()
    }

    fn release_shared_resource(&self, name: &str) -> bool {
        ResourceCache::release_shared_resource(self, name)
    }

    fn evict(&self, name: &str) -> bool {
        ResourceCache::evict(self, name)
    }

    fn wait_until_available(&self, name: &str, timeout: Duration) -> Result<()> {
        self.wait_for_resource(name, timeout).map(drop)
    }
}

/// One cache per concrete [`ResourceKind`].
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: [Option<Arc<dyn SharedCache>>; 4],
}

impl CacheRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cache` under its kind, replacing any previous one.
    pub fn register(&mut self, cache: Arc<dyn SharedCache>) {
        let kind = cache.kind();
        match Self::slot(kind) {
            Some(slot) => self.caches[slot] = Some(cache),
            None => log::warn!("Refusing to register a cache for the {kind:?} wildcard"),
        }
    }

    /// Convenience for registering a typed cache.
    #[must_use]
    pub fn with<T: SharedResource>(mut self, cache: Arc<ResourceCache<T>>) -> Self {
        self.register(cache);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Result<&Arc<dyn SharedCache>> {
        Self::slot(kind)
            .and_then(|slot| self.caches[slot].as_ref())
            .ok_or(MuralError::NoCacheForKind(kind))
    }

    /// Registered caches in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SharedCache>> {
        self.caches.iter().flatten()
    }

    fn slot(kind: ResourceKind) -> Option<usize> {
        match kind {
            ResourceKind::AllResources => None,
            concrete => Some(usize::from(concrete.to_byte())),
        }
    }
}
