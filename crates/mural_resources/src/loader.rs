//! Resource loaders.
//!
//! A loader materializes a resource either from a named source (local disk,
//! an in-memory pack) or from bytes that arrived over the network.

use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use mural_core::errors::{MuralError, Result};

use crate::resource::FromPayload;

/// Kind-specific constructor consumed by [`ResourceCache`](crate::ResourceCache).
pub trait ResourceLoader<T>: Send + Sync {
    /// Constructs the resource from its named source.
    fn load(&self, name: &str) -> Result<T>;

    /// Constructs the resource from a payload received from another node.
    fn construct_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<T>;
}

/// Local file loader rooted at a directory.
///
/// Resource names are relative paths below the root. Names that would escape
/// the root (`..`, absolute paths) are refused.
pub struct FileResourceLoader<T> {
    root_path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileResourceLoader<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root_path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let contained = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(MuralError::load(name, "name escapes the resource root"));
        }
        Ok(self.root_path.join(relative))
    }
}

impl<T: FromPayload> ResourceLoader<T> for FileResourceLoader<T> {
    fn load(&self, name: &str) -> Result<T> {
        let path = self.resolve(name)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| MuralError::load(name, format!("{}: {e}", path.display())))?;
        T::from_payload(name, bytes)
    }

    fn construct_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<T> {
        T::from_payload(name, bytes.to_vec())
    }
}

/// In-memory source table, for resources generated at runtime or shipped in
/// a pack that is already resident.
pub struct MemoryResourceLoader<T> {
    sources: RwLock<FxHashMap<String, Vec<u8>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for MemoryResourceLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryResourceLoader<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(FxHashMap::default()),
            _marker: PhantomData,
        }
    }

    /// Registers (or replaces) the source bytes for `name`.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.sources.write().insert(name.into(), bytes.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().contains_key(name)
    }
}

impl<T: FromPayload> ResourceLoader<T> for MemoryResourceLoader<T> {
    fn load(&self, name: &str) -> Result<T> {
        let bytes = self
            .sources
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MuralError::load(name, "no such source"))?;
        T::from_payload(name, bytes)
    }

    fn construct_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<T> {
        T::from_payload(name, bytes.to_vec())
    }
}
