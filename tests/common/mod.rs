//! Shared fixtures for the integration tests: counting loaders and a small
//! loopback cluster with one coordinator and N workers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mural::resources::{
    FromPayload, MemoryResourceLoader, ProgramData, ResourceCache, ResourceLoader, TextureData,
};
use mural::sync::{FrameReport, LoopbackCluster, LoopbackEndpoint, SyncCoordinator};
use mural::{ClusterIdentity, ClusterNode, NodeId, NodeLoaders, Result, SyncSettings};

pub const COORDINATOR: NodeId = NodeId(0);

/// Memory-backed loader that counts every construction it performs.
pub struct CountingLoader<T> {
    sources: MemoryResourceLoader<T>,
    loads: AtomicUsize,
    constructions: AtomicUsize,
}

impl<T> CountingLoader<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sources: MemoryResourceLoader::new(),
            loads: AtomicUsize::new(0),
            constructions: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, name: &str, bytes: &[u8]) {
        self.sources.insert(name, bytes.to_vec());
    }

    /// Constructions from a named source.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Constructions from network bytes.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl<T: FromPayload> ResourceLoader<T> for CountingLoader<T> {
    fn load(&self, name: &str) -> Result<T> {
        let resource = self.sources.load(name)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(resource)
    }

    fn construct_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<T> {
        let resource = self.sources.construct_from_bytes(name, bytes)?;
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(resource)
    }
}

pub fn texture_cache() -> (Arc<ResourceCache<TextureData>>, Arc<CountingLoader<TextureData>>) {
    let loader = CountingLoader::<TextureData>::new();
    let cache = Arc::new(ResourceCache::<TextureData>::with_loader(loader.clone()));
    (cache, loader)
}

/// Routes library logs through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_settings() -> SyncSettings {
    SyncSettings {
        wait_timeout: Duration::from_millis(200),
        ..SyncSettings::default()
    }
}

/// One node of a loopback test cluster, with counting texture and program
/// loaders.
pub struct TestNode {
    pub node: ClusterNode,
    pub endpoint: Arc<LoopbackEndpoint>,
    pub texture_loader: Arc<CountingLoader<TextureData>>,
    pub program_loader: Arc<CountingLoader<ProgramData>>,
}

impl TestNode {
    fn new(cluster: &LoopbackCluster, identity: ClusterIdentity, settings: SyncSettings) -> Self {
        let endpoint = Arc::new(cluster.endpoint(identity.node).expect("node is a member"));
        let texture_loader = CountingLoader::<TextureData>::new();
        let program_loader = CountingLoader::<ProgramData>::new();
        let loaders = NodeLoaders {
            textures: texture_loader.clone(),
            programs: program_loader.clone(),
            ..NodeLoaders::default()
        };

        Self {
            node: ClusterNode::new(identity, settings, endpoint.clone(), loaders),
            endpoint,
            texture_loader,
            program_loader,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.identity().node
    }

    pub fn sync(&self) -> &SyncCoordinator {
        self.node.sync()
    }

    pub fn textures(&self) -> &Arc<ResourceCache<TextureData>> {
        self.node.textures()
    }

    pub fn programs(&self) -> &Arc<ResourceCache<ProgramData>> {
        self.node.programs()
    }

    /// Dispatches everything in this node's inbox.
    pub fn pump(&self) -> usize {
        self.endpoint.pump(self.node.sync())
    }

    /// Runs this node's frame boundary.
    pub fn frame(&self) -> FrameReport {
        self.node.frame()
    }
}

pub struct TestCluster {
    pub transport: LoopbackCluster,
    pub coordinator: TestNode,
    pub workers: Vec<TestNode>,
}

impl TestCluster {
    pub fn new(workers: u32) -> Self {
        Self::with_settings(workers, test_settings())
    }

    pub fn with_settings(workers: u32, settings: SyncSettings) -> Self {
        init_logging();
        let ids: Vec<NodeId> = (1..=workers).map(NodeId).collect();
        let transport = LoopbackCluster::new(COORDINATOR, ids.iter().copied());

        let coordinator = TestNode::new(
            &transport,
            ClusterIdentity::coordinator(COORDINATOR),
            settings.clone(),
        );
        let workers = ids
            .into_iter()
            .map(|id| TestNode::new(&transport, ClusterIdentity::worker(id, COORDINATOR), settings.clone()))
            .collect();

        Self {
            transport,
            coordinator,
            workers,
        }
    }

    pub fn worker(&self, index: usize) -> &TestNode {
        &self.workers[index]
    }

    /// Delivers messages until every inbox is empty.
    pub fn settle(&self) {
        loop {
            let mut moved = self.coordinator.pump();
            for worker in &self.workers {
                moved += worker.pump();
            }
            if moved == 0 {
                break;
            }
        }
    }

    /// One full cluster frame: deliver, frame boundary everywhere, deliver.
    pub fn step(&self) {
        self.settle();
        self.coordinator.frame();
        self.settle();
        for worker in &self.workers {
            worker.frame();
        }
    }
}
