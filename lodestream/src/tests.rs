//! End-to-end scenarios driving the whole multiplexer.

use std::sync::Arc;

use glam::Vec3;
use lodestream_scene::{BoundingSphere, CameraPose, Slug, VisibilitySnapshot};

use crate::backend::InlineBackend;
use crate::config::{CadenceConfig, SchedulerConfig};
use crate::driver::PollDriver;
use crate::fetch::MemoryFetch;
use crate::materialize::NullMaterializer;
use crate::metadata::{AssetMetadata, ContentHash, RefinementStream, TextureAtlas, TextureLevel};
use crate::multiplex::MultiplexPool;
use crate::priority::{PriorityEngine, Strategy};
use crate::refine::FixedWidthDecoder;
use crate::task::{Completion, RunContext, Task};

/// Asset with a base level, two higher mips, and a single-chunk refinement
/// stream: five renderer-visible completions in total.
fn boulder_metadata() -> AssetMetadata {
    AssetMetadata {
        mesh: ContentHash::from("boulder-mesh"),
        mesh_size: 64,
        atlas: TextureAtlas {
            hash: ContentHash::from("boulder-atlas"),
            levels: vec![
                TextureLevel {
                    offset: 0,
                    length: 16,
                    width: 128,
                    height: 128,
                },
                TextureLevel {
                    offset: 16,
                    length: 32,
                    width: 256,
                    height: 256,
                },
                TextureLevel {
                    offset: 48,
                    length: 64,
                    width: 512,
                    height: 512,
                },
            ],
        },
        refinement: Some(RefinementStream {
            hash: ContentHash::from("boulder-pm"),
            size: 24,
            gzip_size: 12,
            chunk_size: 64,
        }),
        reference_error: 200.0,
    }
}

fn boulder_context() -> RunContext {
    let mut fetch = MemoryFetch::new();
    fetch.put_metadata("boulder", boulder_metadata());
    fetch.put_blob(ContentHash::from("boulder-mesh"), vec![1u8; 64]);
    fetch.put_blob(ContentHash::from("boulder-atlas"), vec![2u8; 112]);
    fetch.put_blob(ContentHash::from("boulder-pm"), vec![3u8; 24]);
    RunContext {
        fetch: Arc::new(fetch),
        materializer: Arc::new(NullMaterializer),
        decoder: Arc::new(FixedWidthDecoder { op_size: 8 }),
    }
}

fn boulder_snapshot() -> VisibilitySnapshot {
    VisibilitySnapshot::fixed(CameraPose::new(Vec3::ZERO, Vec3::X))
        .with_entity("boulder", BoundingSphere::new(Vec3::new(10.0, 0.0, 0.0), 2.0))
}

fn completion_kind_order(events: &[Completion]) {
    let position = |predicate: fn(&Completion) -> bool| {
        events
            .iter()
            .position(predicate)
            .expect("expected completion missing")
    };
    let metadata = position(|e| matches!(e, Completion::Metadata { .. }));
    let mesh = position(|e| matches!(e, Completion::Mesh { .. }));
    let texture = position(|e| matches!(e, Completion::TextureLevel { .. }));
    let refinement = position(|e| matches!(e, Completion::RefinementChunk { .. }));
    assert!(metadata < mesh, "metadata must precede the mesh");
    assert!(mesh < texture, "mesh must precede texture levels");
    assert!(mesh < refinement, "mesh must precede refinement chunks");
}

#[test]
fn single_entity_drains_in_dependency_order() {
    let mut mux = MultiplexPool::new(
        &SchedulerConfig::default(),
        InlineBackend,
        boulder_context(),
    );
    let mut engine = PriorityEngine::seeded(Strategy::Fixed, 5);
    mux.submit(Task::metadata_fetch(Slug::new("boulder"))).unwrap();

    let snapshot = boulder_snapshot();
    let mut events = Vec::new();
    for _ in 0..64 {
        events.extend(mux.poll(&snapshot, &mut engine).unwrap());
        if mux.empty() {
            break;
        }
    }

    assert!(mux.empty(), "multiplexer failed to drain");
    assert_eq!(events.len(), 5, "events: {events:?}");
    completion_kind_order(&events);

    let textures: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            Completion::TextureLevel { level, .. } => Some(*level),
            _ => None,
        })
        .collect();
    assert_eq!(textures, vec![1, 2], "mip levels arrive in order");

    // Drained pool: a further poll completes nothing and dispatches nothing.
    assert!(mux.poll(&snapshot, &mut engine).unwrap().is_empty());
    assert!(mux.empty());
}

#[test]
fn random_strategy_drains_without_scoring() {
    let mut mux = MultiplexPool::new(
        &SchedulerConfig::default(),
        InlineBackend,
        boulder_context(),
    );
    let mut engine = PriorityEngine::seeded(Strategy::UniformRandom, 5);
    mux.submit(Task::metadata_fetch(Slug::new("boulder"))).unwrap();

    let snapshot = boulder_snapshot();
    let mut events = Vec::new();
    for _ in 0..64 {
        events.extend(mux.poll(&snapshot, &mut engine).unwrap());
        if mux.empty() {
            break;
        }
    }

    assert!(mux.empty());
    assert_eq!(events.len(), 5);
    assert_eq!(engine.metric_evals(), 0);
}

#[tokio::test(start_paused = true)]
async fn poll_driver_drains_and_reports() {
    let mut mux = MultiplexPool::new(
        &SchedulerConfig::default(),
        InlineBackend,
        boulder_context(),
    );
    let mut engine = PriorityEngine::seeded(Strategy::Fixed, 5);
    mux.submit(Task::metadata_fetch(Slug::new("boulder"))).unwrap();

    let driver = PollDriver::new(CadenceConfig::default());
    let mut events = Vec::new();
    let total = driver
        .run(&mut mux, &mut engine, boulder_snapshot, |completion| {
            events.push(completion)
        })
        .await
        .unwrap();

    assert_eq!(total, 5);
    assert_eq!(events.len(), 5);
    completion_kind_order(&events);
    assert!(mux.empty());
}
