//! Cluster Node
//!
//! [`ClusterNode`] bundles what one machine of a display wall needs: a cache
//! for every resource kind and the [`SyncCoordinator`] that keeps them in step
//! with the rest of the cluster. It owns no window and no transport; the
//! cluster engine hands it a [`Transport`] and drives it from its own loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use mural::{ClusterIdentity, ClusterNode, NodeId, NodeLoaders, SyncSettings};
//!
//! let node = ClusterNode::new(
//!     ClusterIdentity::worker(NodeId(3), NodeId(0)),
//!     SyncSettings::default(),
//!     transport,
//!     NodeLoaders::from_directory("assets"),
//! );
//!
//! node.sync().request_shared_resource(ResourceKind::Texture, "wall.png")?;
//!
//! loop {
//!     // ... transport delivers into node.sync().on_data_received(..) ...
//!     node.frame();
//!     // ... draw ...
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};

use mural_core::{ClusterIdentity, SyncSettings};
use mural_resources::{
    CacheRegistry, FileResourceLoader, FontData, MemoryResourceLoader, MeshData, ProgramData,
    ResourceCache, ResourceLoader, TextureData,
};
use mural_sync::{FrameReport, SyncCoordinator, Transport};

/// One loader per resource kind.
#[derive(Clone)]
pub struct NodeLoaders {
    pub textures: Arc<dyn ResourceLoader<TextureData>>,
    pub meshes: Arc<dyn ResourceLoader<MeshData>>,
    pub programs: Arc<dyn ResourceLoader<ProgramData>>,
    pub fonts: Arc<dyn ResourceLoader<FontData>>,
}

impl NodeLoaders {
    /// File loaders rooted at `root`, one subdirectory per kind:
    /// `textures/`, `meshes/`, `programs/`, `fonts/`.
    pub fn from_directory(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            textures: Arc::new(FileResourceLoader::<TextureData>::new(root.join("textures"))),
            meshes: Arc::new(FileResourceLoader::<MeshData>::new(root.join("meshes"))),
            programs: Arc::new(FileResourceLoader::<ProgramData>::new(root.join("programs"))),
            fonts: Arc::new(FileResourceLoader::<FontData>::new(root.join("fonts"))),
        }
    }
}

/// Empty in-memory loaders. Resources can only arrive over the network.
impl Default for NodeLoaders {
    fn default() -> Self {
        Self {
            textures: Arc::new(MemoryResourceLoader::<TextureData>::new()),
            meshes: Arc::new(MemoryResourceLoader::<MeshData>::new()),
            programs: Arc::new(MemoryResourceLoader::<ProgramData>::new()),
            fonts: Arc::new(MemoryResourceLoader::<FontData>::new()),
        }
    }
}

/// The caches and sync state of one cluster machine.
///
/// # Lifecycle
///
/// 1. Create with [`ClusterNode::new`]
/// 2. Route inbound transport traffic to [`sync`](Self::sync)
/// 3. Call [`frame`](Self::frame) once per frame on the render thread
pub struct ClusterNode {
    sync: SyncCoordinator,
    textures: Arc<ResourceCache<TextureData>>,
    meshes: Arc<ResourceCache<MeshData>>,
    programs: Arc<ResourceCache<ProgramData>>,
    fonts: Arc<ResourceCache<FontData>>,
    frame_count: AtomicU64,
}

impl ClusterNode {
    #[must_use]
    pub fn new(
        identity: ClusterIdentity,
        settings: SyncSettings,
        transport: Arc<dyn Transport>,
        loaders: NodeLoaders,
    ) -> Self {
        let textures = Arc::new(ResourceCache::with_loader(loaders.textures));
        let meshes = Arc::new(ResourceCache::with_loader(loaders.meshes));
        let programs = Arc::new(ResourceCache::with_loader(loaders.programs));
        let fonts = Arc::new(ResourceCache::with_loader(loaders.fonts));

        let caches = CacheRegistry::new()
            .with(Arc::clone(&textures))
            .with(Arc::clone(&meshes))
            .with(Arc::clone(&programs))
            .with(Arc::clone(&fonts));

        Self {
            sync: SyncCoordinator::new(identity, settings, transport, caches),
            textures,
            meshes,
            programs,
            fonts,
            frame_count: AtomicU64::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    #[inline]
    #[must_use]
    pub fn identity(&self) -> ClusterIdentity {
        self.sync.identity()
    }

    #[inline]
    #[must_use]
    pub fn textures(&self) -> &Arc<ResourceCache<TextureData>> {
        &self.textures
    }

    #[inline]
    #[must_use]
    pub fn meshes(&self) -> &Arc<ResourceCache<MeshData>> {
        &self.meshes
    }

    #[inline]
    #[must_use]
    pub fn programs(&self) -> &Arc<ResourceCache<ProgramData>> {
        &self.programs
    }

    #[inline]
    #[must_use]
    pub fn fonts(&self) -> &Arc<ResourceCache<FontData>> {
        &self.fonts
    }

    /// Frames completed so far.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Runs the frame boundary: released resources are evicted, staged ones
    /// become live and, on the coordinator, queued requests are answered.
    ///
    /// Must be called on the render thread, before drawing.
    pub fn frame(&self) -> FrameReport {
        let report = self.sync.on_frame_boundary();
        let frame = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;

        if report.apply.refused {
            warn!("{}: frame {frame} ran off the render thread", self.identity().node);
        } else if !report.apply.is_empty() || report.requests_served > 0 {
            info!(
                "{}: frame {frame} released {}, applied {} resources, served {} requests",
                self.identity().node,
                report.apply.released.len(),
                report.apply.applied.len(),
                report.requests_served
            );
        }
        report
    }
}
