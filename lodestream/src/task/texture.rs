use std::sync::Arc;

use lodestream_scene::Slug;

use super::{Advance, Completion, ProgressEvent, RunContext, Task, TaskKind, TaskOutput};
use crate::backend::WorkFn;
use crate::error::FetchError;
use crate::materialize::Artifact;
use crate::metadata::AssetMetadata;

/// Texture levels are JPEG; compression buys nothing, so the transfer cost
/// is the level's byte length itself.
pub(crate) fn cost(metadata: &AssetMetadata, level: usize) -> u64 {
    metadata.level(level).map_or(1, |info| info.length)
}

pub(crate) fn work(
    slug: &Slug,
    metadata: &Arc<AssetMetadata>,
    level: usize,
    ctx: &RunContext,
) -> WorkFn {
    let slug = slug.clone();
    let metadata = metadata.clone();
    let fetch = ctx.fetch.clone();
    let materializer = ctx.materializer.clone();
    Box::new(move || {
        let info = metadata
            .level(level)
            .ok_or_else(|| FetchError::NotFound(format!("{slug} atlas level {level}")))?;
        let data = fetch.bytes(
            &metadata.atlas.hash,
            Some(info.offset..info.offset + info.length),
        )?;
        let artifact = materializer.texture_level(&slug, level, data)?;
        Ok(TaskOutput::TextureArtifact(artifact))
    })
}

/// One mip level resident: fetch the next one if the atlas has more,
/// otherwise the texture chain terminates here.
pub(crate) fn finished(
    slug: Slug,
    metadata: Arc<AssetMetadata>,
    level: usize,
    artifact: Artifact,
) -> Advance {
    let successors = match metadata.next_level(level) {
        Some(next) => vec![Task::new(
            slug.clone(),
            TaskKind::TextureLevelFetch {
                metadata: metadata.clone(),
                level: next,
            },
        )],
        None => Vec::new(),
    };
    Advance {
        successors,
        progress: ProgressEvent::Texture { level },
        completion: Some(Completion::TextureLevel {
            slug,
            level,
            artifact,
        }),
    }
}
