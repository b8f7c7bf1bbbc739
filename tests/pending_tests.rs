//! Pending Table & Frame Apply Tests
//!
//! Tests for:
//! - Staging de-duplication, observed through loader construction counts
//! - Draining from the render thread while an I/O thread stages
//! - The apply gate's kind routing and failure reporting

mod common;

use std::sync::Arc;
use std::thread;

use mural::resources::{CacheRegistry, ResourceCache, TextureData};
use mural::sync::{FrameApplyGate, PendingResourceTable, ResourceKey};
use mural::{MuralError, ResourceKind};

use common::{texture_cache, CountingLoader};

fn gate_with_textures() -> (
    FrameApplyGate,
    Arc<ResourceCache<TextureData>>,
    Arc<CountingLoader<TextureData>>,
) {
    let (textures, loader) = texture_cache();
    let gate = FrameApplyGate::new(
        Arc::new(PendingResourceTable::new()),
        CacheRegistry::new().with(Arc::clone(&textures)),
    );
    (gate, textures, loader)
}

// ============================================================================
// De-duplication
// ============================================================================

#[test]
fn duplicate_stage_constructs_once() {
    let (gate, textures, loader) = gate_with_textures();

    assert!(gate.pending().stage(ResourceKind::Texture, "wall.png", b"first".to_vec()));
    assert!(!gate.pending().stage(ResourceKind::Texture, "wall.png", b"second".to_vec()));
    assert_eq!(gate.pending().len(), 1);

    let report = gate.apply_pending();
    assert_eq!(report.applied, vec![ResourceKey::new(ResourceKind::Texture, "wall.png")]);
    assert_eq!(loader.constructions(), 1);
    assert_eq!(textures.payload_of("wall.png").unwrap(), b"first");
}

#[test]
fn same_name_different_kinds_are_distinct() {
    let table = PendingResourceTable::new();
    assert!(table.stage(ResourceKind::Texture, "wall", vec![1]));
    assert!(table.stage(ResourceKind::Mesh, "wall", vec![2]));

    let drained = table.drain_all();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].key(), ResourceKey::new(ResourceKind::Texture, "wall"));
    assert_eq!(drained[1].payload, vec![2]);
}

#[test]
fn restaging_after_drain_is_allowed_but_skipped_on_apply() {
    let (gate, _, loader) = gate_with_textures();

    gate.pending().stage(ResourceKind::Texture, "wall.png", b"pixels".to_vec());
    assert_eq!(gate.apply_pending().applied.len(), 1);

    assert!(gate.pending().stage(ResourceKind::Texture, "wall.png", b"pixels".to_vec()));
    let report = gate.apply_pending();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(loader.constructions(), 1);
}

// ============================================================================
// Cross-thread Staging
// ============================================================================

#[test]
fn io_thread_stages_while_render_thread_drains() {
    let (gate, textures, loader) = gate_with_textures();
    let pending = Arc::clone(gate.pending());

    let io = thread::spawn(move || {
        for i in 0..64 {
            pending.stage(ResourceKind::Texture, &format!("tile_{i}.png"), vec![i as u8 + 1]);
            pending.stage(ResourceKind::Texture, &format!("tile_{i}.png"), vec![0xEE]);
        }
    });

    let mut applied = 0;
    while !io.is_finished() {
        applied += gate.apply_pending().applied.len();
        thread::yield_now();
    }
    io.join().unwrap();
    applied += gate.apply_pending().applied.len();

    assert_eq!(applied, 64);
    assert_eq!(textures.len(), 64);
    assert_eq!(loader.constructions(), 64);
}

// ============================================================================
// Gate Routing
// ============================================================================

#[test]
fn unregistered_kind_fails_without_blocking_others() {
    let (gate, textures, _) = gate_with_textures();
    gate.pending().stage(ResourceKind::Mesh, "quad", vec![1, 2, 3]);
    gate.pending().stage(ResourceKind::Texture, "wall.png", vec![4]);

    let report = gate.apply_pending();
    assert_eq!(report.drained(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, MuralError::NoCacheForKind(ResourceKind::Mesh)));
    assert!(textures.has_resource("wall.png"));
}

#[test]
fn construction_failure_is_reported_and_not_inserted() {
    let (gate, textures, loader) = gate_with_textures();
    gate.pending().stage(ResourceKind::Texture, "empty.png", Vec::new());

    let report = gate.apply_pending();
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, MuralError::ResourceLoad { .. }));
    assert!(!textures.has_resource("empty.png"));
    assert_eq!(loader.constructions(), 0);
}

#[test]
fn loader_is_only_invoked_by_apply() {
    let (gate, _, loader) = gate_with_textures();
    gate.pending().stage(ResourceKind::Texture, "wall.png", vec![1]);
    assert_eq!(loader.constructions(), 0, "staging must not construct");

    gate.apply_pending();
    assert_eq!(loader.constructions(), 1);
}
