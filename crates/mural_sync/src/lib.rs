//! Mural Sync
//!
//! Coordinator/worker resource synchronization for a rendering cluster:
//!
//! - [`SyncCoordinator`]: role-aware request → transfer → apply orchestration
//! - [`PendingResourceTable`]: staging for payloads received between frames
//! - [`FrameApplyGate`]: the once-per-frame, render-thread-only apply point
//! - [`Transport`]: the outbound seam into the cluster engine's network
//! - [`LoopbackCluster`]: an in-process star-topology transport
//!
//! # Frame Loop
//!
//! ```rust,ignore
//! // I/O thread, for each inbound message:
//! sync.on_data_received(&bytes, package_id, source)?;
//!
//! // Render thread, every frame before drawing:
//! let report = sync.on_frame_boundary();
//! ```

pub mod coordinator;
pub mod gate;
pub mod loopback;
pub mod pending;
pub mod stats;
pub mod transport;
pub mod wire;

pub use coordinator::{FrameReport, SyncCoordinator, SyncState, UserDataHandler};
pub use gate::{ApplyReport, FrameApplyGate};
pub use loopback::{LinkMessage, LoopbackCluster, LoopbackEndpoint};
pub use pending::{FrameDrain, PendingResource, PendingResourceTable, ResourceKey};
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use transport::{Envelope, Transport};
