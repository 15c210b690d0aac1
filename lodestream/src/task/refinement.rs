use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use lodestream_scene::Slug;

use super::{Advance, Completion, ProgressEvent, RunContext, Task, TaskKind, TaskOutput};
use crate::backend::WorkFn;
use crate::error::DecodeError;
use crate::metadata::{AssetMetadata, RefinementStream};
use crate::refine::{ChunkCarry, DecodedChunk};

pub(crate) fn chunk_len(stream: &RefinementStream, offset: u64) -> u64 {
    (stream.size - offset).min(stream.chunk_size)
}

/// A range request over the gzipped stream will not compress exactly like
/// the chunk's share of the whole file, but the estimate lands close enough
/// to normalize benefit against.
pub(crate) fn cost(metadata: &AssetMetadata, offset: u64) -> u64 {
    let Some(stream) = &metadata.refinement else {
        return 1;
    };
    let fraction = chunk_len(stream, offset) as f64 / stream.size as f64;
    ((fraction * stream.gzip_size as f64) as u64).max(1)
}

pub(crate) fn work(
    metadata: &Arc<AssetMetadata>,
    offset: u64,
    carry: ChunkCarry,
    ctx: &RunContext,
) -> WorkFn {
    let metadata = metadata.clone();
    let fetch = ctx.fetch.clone();
    let decoder = ctx.decoder.clone();
    Box::new(move || {
        let stream = metadata
            .refinement
            .as_ref()
            .ok_or_else(|| DecodeError("asset has no refinement stream".into()))?;
        let length = chunk_len(stream, offset);
        let fetched = fetch.bytes(&stream.hash, Some(offset..offset + length))?;

        // Undecoded tail of the previous chunk precedes the new bytes.
        let data = if carry.leftover.is_empty() {
            fetched
        } else {
            let mut joined = BytesMut::with_capacity(carry.leftover.len() + fetched.len());
            joined.put(carry.leftover.clone());
            joined.put(fetched);
            joined.freeze()
        };

        let decoded = decoder.decode(data, &carry)?;
        Ok(TaskOutput::RefinementChunk(decoded))
    })
}

/// Chunk decoded: advance the chain by exactly one successor while stream
/// bytes remain, carrying the parse state forward.
pub(crate) fn finished(
    slug: Slug,
    metadata: Arc<AssetMetadata>,
    offset: u64,
    decoded: DecodedChunk,
) -> Advance {
    let DecodedChunk { ops, carry } = decoded;
    let stream = metadata
        .refinement
        .as_ref()
        .expect("refinement task exists only for assets with a stream");
    let length = chunk_len(stream, offset);

    let successors = if offset + length < stream.size {
        vec![Task::new(
            slug.clone(),
            TaskKind::RefinementChunkFetch {
                metadata: metadata.clone(),
                offset: offset + length,
                carry,
            },
        )]
    } else {
        Vec::new()
    };

    Advance {
        successors,
        progress: ProgressEvent::Refinement {
            bytes: length,
            ops: ops.len() as u64,
        },
        completion: Some(Completion::RefinementChunk { slug, offset, ops }),
    }
}
