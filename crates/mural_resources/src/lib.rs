//! Mural Resources
//!
//! Per-kind resource caches with get-or-create semantics:
//!
//! - [`ResourceCache`]: name → weak-reference cache for one resource kind
//! - [`ResourceHandle`] / [`WeakResourceHandle`]: strong and weak observers
//! - [`ResourceLoader`]: kind-specific construction from a named source or from bytes
//! - [`SharedCache`] / [`CacheRegistry`]: kind-routed, type-erased access for the sync layer
//!
//! # Example
//!
//! ```rust,ignore
//! use mural_resources::{MemoryResourceLoader, ResourceCache, TextureData};
//!
//! let loader = MemoryResourceLoader::<TextureData>::new();
//! loader.insert("wall.png", png_bytes);
//!
//! let textures = ResourceCache::new(loader);
//! let a = textures.get_resource("wall.png")?;
//! let b = textures.get_resource("wall.png")?;
//! assert!(a.ptr_eq(&b));
//! ```

pub mod cache;
pub mod handle;
pub mod loader;
pub mod resource;
pub mod shared;

pub use cache::ResourceCache;
pub use handle::{ResourceHandle, WeakResourceHandle};
pub use loader::{FileResourceLoader, MemoryResourceLoader, ResourceLoader};
pub use resource::{FontData, FromPayload, MeshData, ProgramData, SharedResource, TextureData};
pub use shared::{CacheRegistry, SharedCache};
