//! Display Wall
//!
//! Simulates a four-machine display wall in one process: one coordinator and
//! three workers linked by the loopback transport, each running its own frame
//! loop on its own thread.
//!
//! - worker 1 asks for the wall texture and a program, and waits for the
//!   texture from a loader thread
//! - worker 2 asks for everything the coordinator has
//! - worker 3 asks for nothing and is synchronized when it connects
//!
//! Run with `RUST_LOG=debug` to follow every message.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, info};

use mural::resources::{FontData, MemoryResourceLoader, MeshData, ProgramData, TextureData};
use mural::sync::{LoopbackCluster, LoopbackEndpoint};
use mural::{ClusterIdentity, ClusterNode, NodeId, NodeLoaders, ResourceKind, SyncSettings};

const COORDINATOR: NodeId = NodeId(0);
const WORKERS: [NodeId; 3] = [NodeId(1), NodeId(2), NodeId(3)];
const FRAME_TIME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u64 = 300;

struct Machine {
    node: ClusterNode,
    endpoint: Arc<LoopbackEndpoint>,
}

impl Machine {
    fn new(
        cluster: &LoopbackCluster,
        identity: ClusterIdentity,
        loaders: NodeLoaders,
    ) -> anyhow::Result<Self> {
        let endpoint = Arc::new(
            cluster
                .endpoint(identity.node)
                .ok_or_else(|| anyhow::anyhow!("{} is not in the cluster", identity.node))?,
        );
        let node = ClusterNode::new(identity, SyncSettings::default(), endpoint.clone(), loaders);
        Ok(Self { node, endpoint })
    }

    /// Delivers inbound traffic, then runs one frame boundary.
    fn tick(&self) {
        self.endpoint.pump(self.node.sync());
        self.node.frame();
    }

    fn has_all(&self, wanted: &[(ResourceKind, &str)]) -> bool {
        wanted
            .iter()
            .all(|(kind, name)| self.node.sync().has_resource(*kind, name))
    }
}

fn coordinator_library() -> NodeLoaders {
    let textures = MemoryResourceLoader::<TextureData>::new();
    textures.insert("wall.png", b"\x89PNG wall".to_vec());
    textures.insert("logo.png", b"\x89PNG logo".to_vec());

    let meshes = MemoryResourceLoader::<MeshData>::new();
    meshes.insert("quad", vec![0, 0, 1, 0, 1, 1, 0, 1]);

    let programs = MemoryResourceLoader::<ProgramData>::new();
    programs.insert("blit", "void main() { color = texture(tex, uv); }");

    let fonts = MemoryResourceLoader::<FontData>::new();
    fonts.insert("mono.ttf", b"\0\x01\0\0 mono".to_vec());

    NodeLoaders {
        textures: Arc::new(textures),
        meshes: Arc::new(meshes),
        programs: Arc::new(programs),
        fonts: Arc::new(fonts),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. Wire up the cluster
    let cluster = LoopbackCluster::new(COORDINATOR, WORKERS);
    let coordinator = Machine::new(
        &cluster,
        ClusterIdentity::coordinator(COORDINATOR),
        coordinator_library(),
    )?;
    let workers = WORKERS
        .iter()
        .map(|id| {
            Machine::new(
                &cluster,
                ClusterIdentity::worker(*id, COORDINATOR),
                NodeLoaders::default(),
            )
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    // 2. Warm the coordinator's caches
    let sync = coordinator.node.sync();
    for name in ["wall.png", "logo.png"] {
        coordinator.node.textures().share_resource(name)?;
    }
    coordinator.node.meshes().share_resource("quad")?;
    coordinator.node.programs().share_resource("blit")?;
    coordinator.node.fonts().share_resource("mono.ttf")?;

    // 3. Each worker states what it needs
    let wanted: [Vec<(ResourceKind, &str)>; 3] = [
        vec![(ResourceKind::Texture, "wall.png"), (ResourceKind::GpuProgram, "blit")],
        vec![
            (ResourceKind::Texture, "logo.png"),
            (ResourceKind::Mesh, "quad"),
            (ResourceKind::Font, "mono.ttf"),
        ],
        vec![(ResourceKind::Texture, "wall.png"), (ResourceKind::Font, "mono.ttf")],
    ];
    for (kind, name) in &wanted[0] {
        workers[0].node.sync().request_shared_resource(*kind, name)?;
    }
    workers[1].node.sync().request_all_resources()?;
    sync.on_connection_status_changed(true, workers[2].node.identity().node);

    // 4. Run every machine's frame loop until the wall is in sync, then
    // retire a resource across the wall. Eviction happens inside each
    // worker's frame, so the loops keep running until the release lands.
    let done = AtomicBool::new(false);
    thread::scope(|s| -> anyhow::Result<()> {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                coordinator.tick();
                thread::sleep(FRAME_TIME);
            }
        });

        s.spawn(|| {
            match workers[0]
                .node
                .sync()
                .wait_for_resource(ResourceKind::Texture, "wall.png")
            {
                Ok(()) => info!("{}: loader thread saw wall.png", WORKERS[0]),
                Err(e) => error!("{}: {e}", WORKERS[0]),
            }
        });

        let running = &done;
        for worker in &workers {
            s.spawn(move || {
                while !running.load(Ordering::Acquire) {
                    worker.tick();
                    thread::sleep(FRAME_TIME);
                }
            });
        }

        let in_sync = || {
            workers
                .iter()
                .zip(&wanted)
                .filter(|(worker, wanted)| worker.has_all(wanted))
                .count()
        };
        while in_sync() < workers.len() && coordinator.node.frame_count() < MAX_FRAMES {
            thread::sleep(FRAME_TIME);
        }
        info!("{}/{} workers in sync", in_sync(), WORKERS.len());

        // 5. Retire the logo everywhere
        let result = sync.release_shared_resource(ResourceKind::Texture, "logo.png");
        let deadline = coordinator.node.frame_count() + MAX_FRAMES;
        while workers
            .iter()
            .any(|w| w.node.sync().has_resource(ResourceKind::Texture, "logo.png"))
            && coordinator.node.frame_count() < deadline
        {
            thread::sleep(FRAME_TIME);
        }
        done.store(true, Ordering::Release);
        result.map(drop)?;
        Ok(())
    })?;

    for worker in &workers {
        info!(
            "{}: textures {:?}, frames {}",
            worker.node.identity().node,
            worker.node.textures().names(),
            worker.node.frame_count()
        );
    }

    info!("coordinator stats: {:?}", sync.stats());
    for worker in &workers {
        info!("{} stats: {:?}", worker.node.identity().node, worker.node.sync().stats());
    }
    Ok(())
}
