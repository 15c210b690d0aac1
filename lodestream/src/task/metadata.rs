use std::sync::Arc;

use lodestream_scene::Slug;

use super::{Advance, Completion, ProgressEvent, Task, TaskKind, TaskOutput};
use crate::backend::WorkFn;
use crate::metadata::AssetMetadata;
use crate::task::RunContext;

/// Gzipped metadata documents run 2-4 KiB; 5 KiB is a conservative estimate.
pub(crate) const METADATA_COST: u64 = 5 * 1024;

pub(crate) fn work(slug: &Slug, ctx: &RunContext) -> WorkFn {
    let slug = slug.clone();
    let fetch = ctx.fetch.clone();
    Box::new(move || {
        let metadata = fetch.metadata(&slug)?;
        Ok(TaskOutput::Metadata(Arc::new(metadata)))
    })
}

/// Metadata in hand: create the entity's progress record and move on to the
/// base mesh.
pub(crate) fn finished(slug: Slug, metadata: Arc<AssetMetadata>) -> Advance {
    tracing::trace!("metadata for {slug} resolved, queueing base mesh");
    let mesh = Task::new(
        slug.clone(),
        TaskKind::MeshFetch {
            metadata: metadata.clone(),
        },
    );
    Advance {
        successors: vec![mesh],
        progress: ProgressEvent::Init(metadata),
        completion: Some(Completion::Metadata { slug }),
    }
}
