//! Name-keyed resource cache.
//!
//! [`ResourceCache`] maps resource names to weak observers of live instances.
//! A lookup on a live name hands out another strong handle to the same
//! allocation; a lookup on an expired or unknown name constructs a new
//! instance through the cache's [`ResourceLoader`].
//!
//! Instances created from network payloads are additionally *pinned*: the
//! cache keeps one strong reference so they stay queryable until
//! [`release_shared_resource`](ResourceCache::release_shared_resource).
//!
//! Construction runs while the cache lock is held, which is what guarantees a
//! single instance per name. Loaders must therefore never call back into the
//! cache that owns them.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use mural_core::errors::{MuralError, Result};
use mural_core::ResourceKind;

use crate::handle::{ResourceHandle, WeakResourceHandle};
use crate::loader::ResourceLoader;
use crate::resource::SharedResource;

struct CacheEntry<T> {
    name: Arc<str>,
    weak: Weak<T>,
    pinned: Option<Arc<T>>,
    generation: u64,
}

impl<T> CacheEntry<T> {
    fn live(&self) -> Option<ResourceHandle<T>> {
        self.weak
            .upgrade()
            .map(|inner| ResourceHandle::new(Arc::clone(&self.name), self.generation, inner))
    }

    fn is_live(&self) -> bool {
        self.weak.strong_count() > 0
    }
}

struct CacheInner<T> {
    entries: FxHashMap<Arc<str>, CacheEntry<T>>,
}

impl<T> CacheInner<T> {
    /// Stores a freshly constructed instance and returns a handle to it.
    fn store(&mut self, name: &str, instance: T, pin: bool) -> ResourceHandle<T> {
        let inner = Arc::new(instance);
        let pinned = pin.then(|| Arc::clone(&inner));

        if let Some(entry) = self.entries.get_mut(name) {
            entry.generation += 1;
            entry.weak = Arc::downgrade(&inner);
            entry.pinned = pinned;
            return ResourceHandle::new(Arc::clone(&entry.name), entry.generation, inner);
        }

        let key: Arc<str> = Arc::from(name);
        let handle = ResourceHandle::new(Arc::clone(&key), 1, Arc::clone(&inner));
        self.entries.insert(
            Arc::clone(&key),
            CacheEntry {
                name: key,
                weak: Arc::downgrade(&inner),
                pinned,
                generation: 1,
            },
        );
        handle
    }
}

/// Weak-reference cache for one resource kind.
pub struct ResourceCache<T: SharedResource> {
    loader: Arc<dyn ResourceLoader<T>>,
    inner: Mutex<CacheInner<T>>,
    available: Condvar,
}

impl<T: SharedResource> ResourceCache<T> {
    pub fn new(loader: impl ResourceLoader<T> + 'static) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    #[must_use]
    pub fn with_loader(loader: Arc<dyn ResourceLoader<T>>) -> Self {
        Self {
            loader,
            inner: Mutex::new(CacheInner {
                entries: FxHashMap::default(),
            }),
            available: Condvar::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        T::KIND
    }

    /// Returns the live instance for `name`, constructing it from the loader's
    /// named source on a miss.
    pub fn get_resource(&self, name: &str) -> Result<ResourceHandle<T>> {
        let loader = Arc::clone(&self.loader);
        self.get_resource_with(name, |name| loader.load(name))
    }

    /// Returns the live instance for `name`, constructing it with `ctor` on a
    /// miss.
    ///
    /// A failed construction leaves the cache untouched.
    pub fn get_resource_with<F>(&self, name: &str, ctor: F) -> Result<ResourceHandle<T>>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        let mut guard = self.inner.lock();
        if let Some(handle) = guard.entries.get(name).and_then(CacheEntry::live) {
            trace!("{} cache hit: {name}", T::KIND.label());
            return Ok(handle);
        }

        let instance = ctor(name).map_err(|e| into_load_error(name, e))?;
        let handle = guard.store(name, instance, false);
        debug!(
            "{} '{name}' constructed (generation {})",
            T::KIND.label(),
            handle.generation()
        );
        drop(guard);

        self.available.notify_all();
        Ok(handle)
    }

    /// Lookup without construction.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<ResourceHandle<T>> {
        self.inner.lock().entries.get(name).and_then(CacheEntry::live)
    }

    /// A weak observer of the live instance for `name`, if any.
    #[must_use]
    pub fn weak_handle(&self, name: &str) -> Option<WeakResourceHandle<T>> {
        let guard = self.inner.lock();
        let entry = guard.entries.get(name).filter(|e| e.is_live())?;
        Some(WeakResourceHandle::from_weak(
            Arc::clone(&entry.name),
            entry.generation,
            Weak::clone(&entry.weak),
        ))
    }

    /// `true` only if an entry exists and has not expired.
    #[must_use]
    pub fn has_resource(&self, name: &str) -> bool {
        self.inner
            .lock()
            .entries
            .get(name)
            .is_some_and(CacheEntry::is_live)
    }

    /// Blocks until `name` is live or `timeout` elapses.
    ///
    /// Must not be called from the render thread: the frame apply point that
    /// would satisfy the wait runs there.
    pub fn wait_for_resource(&self, name: &str, timeout: Duration) -> Result<ResourceHandle<T>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        loop {
            if let Some(handle) = guard.entries.get(name).and_then(CacheEntry::live) {
                return Ok(handle);
            }
            if self.available.wait_until(&mut guard, deadline).timed_out() {
                return guard
                    .entries
                    .get(name)
                    .and_then(CacheEntry::live)
                    .ok_or_else(|| MuralError::ResourceTimeout {
                        name: name.to_string(),
                        timeout,
                    });
            }
        }
    }

    /// Inserts a resource from a network payload and pins it.
    ///
    /// Returns `Ok(false)` without constructing anything when `name` is
    /// already live; the existing instance is pinned instead.
    pub fn create_shared_resource(&self, name: &str, bytes: &[u8]) -> Result<bool> {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.entries.get_mut(name) {
            if let Some(live) = entry.weak.upgrade() {
                debug!(
                    "{} '{name}' already present, skipping shared construction",
                    T::KIND.label()
                );
                entry.pinned.get_or_insert(live);
                return Ok(false);
            }
        }

        let instance = self
            .loader
            .construct_from_bytes(name, bytes)
            .map_err(|e| into_load_error(name, e))?;
        let handle = guard.store(name, instance, true);
        debug!(
            "{} '{name}' materialized from {} bytes (generation {})",
            T::KIND.label(),
            bytes.len(),
            handle.generation()
        );
        drop(guard);

        self.available.notify_all();
        Ok(true)
    }

    /// Loads `name` if needed, pins it, and returns its payload.
    ///
    /// Used by the coordinator to serve requests.
    pub fn share_resource(&self, name: &str) -> Result<Vec<u8>> {
        let handle = self.get_resource(name)?;
        if let Some(entry) = self.inner.lock().entries.get_mut(name) {
            entry.pinned.get_or_insert_with(|| Arc::clone(handle.as_arc()));
        }
        Ok(handle.payload().to_vec())
    }

    /// Payload of the live instance, if any.
    #[must_use]
    pub fn payload_of(&self, name: &str) -> Option<Vec<u8>> {
        self.try_get(name).map(|h| h.payload().to_vec())
    }

    /// Drops the cache's own strong reference so the entry can expire.
    ///
    /// Handles already held by callers stay valid. Returns whether a pin was
    /// dropped.
    pub fn release_shared_resource(&self, name: &str) -> bool {
        let released = self
            .inner
            .lock()
            .entries
            .get_mut(name)
            .and_then(|entry| entry.pinned.take());
        // Drop outside the lock; it may be the last owner.
        let was_pinned = released.is_some();
        drop(released);
        if was_pinned {
            debug!("{} '{name}' released", T::KIND.label());
        }
        was_pinned
    }

    /// Forgets `name` entirely, including its generation counter.
    pub fn evict(&self, name: &str) -> bool {
        let removed = self.inner.lock().entries.remove(name);
        let existed = removed.is_some();
        drop(removed);
        if existed {
            debug!("{} '{name}' evicted", T::KIND.label());
        }
        existed
    }

    /// Generation of the most recent instance constructed for `name`.
    #[must_use]
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.inner.lock().entries.get(name).map(|e| e.generation)
    }

    /// Names with a live instance, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let guard = self.inner.lock();
        let mut names: Vec<String> = guard
            .entries
            .values()
            .filter(|e| e.is_live())
            .map(|e| e.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| e.is_live())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut guard = self.inner.lock();
        let before = guard.entries.len();
        guard.entries.retain(|_, e| e.is_live());
        before - guard.entries.len()
    }
}

fn into_load_error(name: &str, error: MuralError) -> MuralError {
    match error {
        e @ MuralError::ResourceLoad { .. } => e,
        other => MuralError::load(name, other),
    }
}
