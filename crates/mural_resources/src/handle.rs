//! Resource Handle System
//!
//! Reference-counted handles returned by [`ResourceCache`](crate::ResourceCache).
//!
//! # Design Principles
//! - Strong handles ([`ResourceHandle`]) keep a cached instance alive
//! - Weak handles ([`WeakResourceHandle`]) observe an instance without owning it;
//!   the cache itself only stores weak observers
//! - Two strong handles for the same live name always alias one allocation

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Strong resource handle.
///
/// Holding this handle keeps the instance alive. Once every strong handle
/// (and the cache's own pin, if any) is gone the instance is dropped and the
/// next lookup constructs a fresh one.
pub struct ResourceHandle<T> {
    name: Arc<str>,
    generation: u64,
    inner: Arc<T>,
}

impl<T> ResourceHandle<T> {
    pub(crate) fn new(name: Arc<str>, generation: u64, inner: Arc<T>) -> Self {
        Self {
            name,
            generation,
            inner,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many times an instance has been constructed for this name,
    /// counting this one.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of strong owners, including the cache pin.
    #[inline]
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns `true` when both handles point at the same instance.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakResourceHandle<T> {
        WeakResourceHandle {
            name: Arc::clone(&self.name),
            generation: self.generation,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Borrows the shared allocation.
    #[inline]
    #[must_use]
    pub fn as_arc(&self) -> &Arc<T> {
        &self.inner
    }
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            generation: self.generation,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Deref for ResourceHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Weak resource handle.
///
/// Does not keep the instance alive; upgrade before use.
pub struct WeakResourceHandle<T> {
    name: Arc<str>,
    generation: u64,
    inner: Weak<T>,
}

impl<T> WeakResourceHandle<T> {
    pub(crate) fn from_weak(name: Arc<str>, generation: u64, inner: Weak<T>) -> Self {
        Self {
            name,
            generation,
            inner,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Attempts to upgrade to a strong handle.
    ///
    /// Returns `None` once the instance has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<ResourceHandle<T>> {
        self.inner.upgrade().map(|inner| ResourceHandle {
            name: Arc::clone(&self.name),
            generation: self.generation,
            inner,
        })
    }

    /// Checks whether the instance is still alive.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            generation: self.generation,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakResourceHandle")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(value: &str) -> ResourceHandle<String> {
        ResourceHandle::new(Arc::from("wall.png"), 1, Arc::new(value.to_string()))
    }

    #[test]
    fn test_strong_handle_ref_count() {
        let handle1 = handle("pixels");
        assert_eq!(handle1.ref_count(), 1);

        let handle2 = handle1.clone();
        assert_eq!(handle1.ref_count(), 2);
        assert!(handle1.ptr_eq(&handle2));

        drop(handle2);
        assert_eq!(handle1.ref_count(), 1);
    }

    #[test]
    fn test_weak_handle_upgrade() {
        let strong = handle("pixels");
        let weak = strong.downgrade();
        assert!(weak.is_valid());

        let upgraded = weak.upgrade();
        assert!(upgraded.is_some());
        assert_eq!(upgraded.as_deref().map(String::as_str), Some("pixels"));

        drop(strong);
        drop(upgraded);

        assert!(!weak.is_valid());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_handle_metadata() {
        let strong = handle("pixels");
        assert_eq!(strong.name(), "wall.png");
        assert_eq!(strong.generation(), 1);
        assert_eq!(strong.downgrade().name(), "wall.png");
    }
}
