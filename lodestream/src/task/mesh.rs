use std::sync::Arc;

use bytes::Bytes;
use lodestream_scene::Slug;

use super::{Advance, Completion, ProgressEvent, RunContext, Task, TaskKind, TaskOutput};
use crate::backend::WorkFn;
use crate::materialize::Artifact;
use crate::metadata::AssetMetadata;
use crate::refine::ChunkCarry;

pub(crate) fn fetch_cost(metadata: &AssetMetadata) -> u64 {
    let base_texture = metadata
        .base_level()
        .and_then(|index| metadata.level(index))
        .map_or(0, |level| level.length);
    metadata.mesh_size + base_texture
}

/// Download the base mesh together with the base texture level.
pub(crate) fn fetch_work(metadata: &Arc<AssetMetadata>, ctx: &RunContext) -> WorkFn {
    let metadata = metadata.clone();
    let fetch = ctx.fetch.clone();
    Box::new(move || {
        let mesh = fetch.bytes(&metadata.mesh, None)?;
        let base_texture = match metadata.base_level().and_then(|i| metadata.level(i)) {
            Some(level) => fetch.bytes(
                &metadata.atlas.hash,
                Some(level.offset..level.offset + level.length),
            )?,
            None => Bytes::new(),
        };
        Ok(TaskOutput::MeshData { mesh, base_texture })
    })
}

/// Raw mesh downloaded: hand it to the Load pool for materialization. Not a
/// renderer-visible step of its own.
pub(crate) fn fetch_finished(
    slug: Slug,
    metadata: Arc<AssetMetadata>,
    mesh: Bytes,
    base_texture: Bytes,
) -> Advance {
    let materialize = Task::new(
        slug,
        TaskKind::MeshMaterialize {
            metadata,
            mesh,
            base_texture,
        },
    );
    Advance {
        successors: vec![materialize],
        progress: ProgressEvent::None,
        completion: None,
    }
}

pub(crate) fn materialize_work(
    slug: &Slug,
    mesh: Bytes,
    base_texture: Bytes,
    ctx: &RunContext,
) -> WorkFn {
    let slug = slug.clone();
    let materializer = ctx.materializer.clone();
    Box::new(move || {
        let artifact = materializer.mesh(&slug, mesh, base_texture)?;
        Ok(TaskOutput::MeshArtifact(artifact))
    })
}

/// Base mesh loadable: fork the texture chain past the base level, and the
/// refinement chain at offset zero with empty carry-state.
pub(crate) fn materialize_finished(
    slug: Slug,
    metadata: Arc<AssetMetadata>,
    artifact: Artifact,
) -> Advance {
    let mut successors = Vec::new();
    let base_level = metadata.base_level();

    if let Some(next) = base_level.and_then(|index| metadata.next_level(index)) {
        successors.push(Task::new(
            slug.clone(),
            TaskKind::TextureLevelFetch {
                metadata: metadata.clone(),
                level: next,
            },
        ));
    }
    if let Some(stream) = &metadata.refinement
        && stream.size > 0
    {
        successors.push(Task::new(
            slug.clone(),
            TaskKind::RefinementChunkFetch {
                metadata: metadata.clone(),
                offset: 0,
                carry: ChunkCarry::default(),
            },
        ));
    }

    tracing::trace!(
        "base mesh for {slug} materialized, {} follow-on chains",
        successors.len()
    );
    Advance {
        successors,
        progress: ProgressEvent::Base {
            levels_done: base_level.map_or(0, |index| index + 1),
        },
        completion: Some(Completion::Mesh { slug, artifact }),
    }
}
