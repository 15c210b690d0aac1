//! Streams a tiny synthetic scene out of an in-memory store and prints each
//! completion as the scheduler drains.

use std::sync::Arc;

use anyhow::Result;
use glam::Vec3;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use lodestream::{
    AssetMetadata, BoundingSphere, CameraPose, Completion, ContentHash, FixedWidthDecoder,
    MemoryFetch, MultiplexPool, NullMaterializer, PollDriver, PriorityEngine, RefinementStream,
    RunContext, SchedulerConfig, Slug, Strategy, Task, TextureAtlas, TextureLevel, TokioBackend,
    VisibilitySnapshot,
};

fn synthetic_asset(name: &str, size: u64, store: &mut MemoryFetch) {
    let mesh_hash = ContentHash(format!("{name}-mesh"));
    let atlas_hash = ContentHash(format!("{name}-atlas"));
    let pm_hash = ContentHash(format!("{name}-pm"));

    store.put_blob(mesh_hash.clone(), vec![0u8; size as usize]);
    store.put_blob(atlas_hash.clone(), vec![0u8; 3 * size as usize]);
    store.put_blob(pm_hash.clone(), vec![0u8; 2 * size as usize]);
    store.put_metadata(
        name,
        AssetMetadata {
            mesh: mesh_hash,
            mesh_size: size,
            atlas: TextureAtlas {
                hash: atlas_hash,
                levels: vec![
                    TextureLevel {
                        offset: 0,
                        length: size,
                        width: 128,
                        height: 128,
                    },
                    TextureLevel {
                        offset: size,
                        length: 2 * size,
                        width: 512,
                        height: 512,
                    },
                ],
            },
            refinement: Some(RefinementStream {
                hash: pm_hash,
                size: 2 * size,
                gzip_size: size,
                chunk_size: size,
            }),
            reference_error: 100.0,
        },
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut store = MemoryFetch::new();
    synthetic_asset("boulder", 4096, &mut store);
    synthetic_asset("pine", 1024, &mut store);
    synthetic_asset("cabin", 16384, &mut store);

    let ctx = RunContext {
        fetch: Arc::new(store),
        materializer: Arc::new(NullMaterializer),
        decoder: Arc::new(FixedWidthDecoder { op_size: 64 }),
    };
    let config = SchedulerConfig::default();
    let mut mux = MultiplexPool::new(&config, TokioBackend::default(), ctx);
    let mut engine = PriorityEngine::new(Strategy::from_config(&config.strategy)?);

    for name in ["boulder", "pine", "cabin"] {
        mux.submit(Task::metadata_fetch(Slug::new(name)))?;
    }

    let snapshot = VisibilitySnapshot::fixed(CameraPose::new(Vec3::ZERO, Vec3::X))
        .with_entity("boulder", BoundingSphere::new(Vec3::new(12.0, 0.0, 0.0), 3.0))
        .with_entity("pine", BoundingSphere::new(Vec3::new(40.0, 5.0, 0.0), 8.0))
        .with_entity("cabin", BoundingSphere::new(Vec3::new(-30.0, 0.0, 0.0), 10.0));

    let driver = PollDriver::new(config.cadence);
    let total = driver
        .run(&mut mux, &mut engine, || snapshot.clone(), |completion| {
            match completion {
                Completion::Metadata { slug } => println!("metadata    {slug}"),
                Completion::Mesh { slug, artifact } => {
                    println!("mesh        {slug} -> {}", artifact.locator)
                }
                Completion::TextureLevel { slug, level, .. } => {
                    println!("texture     {slug} level {level}")
                }
                Completion::RefinementChunk { slug, offset, ops } => {
                    println!("refinement  {slug} offset {offset} ({} ops)", ops.len())
                }
            }
        })
        .await?;

    println!("scene fully streamed, {total} completions");
    Ok(())
}
