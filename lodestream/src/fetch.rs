use std::collections::HashMap;
use std::ops::Range;

use bytes::Bytes;
use lodestream_scene::Slug;

use crate::error::FetchError;
use crate::metadata::{AssetMetadata, ContentHash};

/// Content-addressed byte-range fetch.
///
/// Implementations own transport, caching and retry/backoff; an error here
/// is terminal for the requesting task. Calls run on the execution backend's
/// workers and may block.
pub trait Fetch: Send + Sync {
    /// Retrieve the metadata document for one asset.
    fn metadata(&self, slug: &Slug) -> Result<AssetMetadata, FetchError>;

    /// Retrieve content by hash, optionally restricted to a byte range.
    fn bytes(&self, hash: &ContentHash, range: Option<Range<u64>>) -> Result<Bytes, FetchError>;
}

/// In-memory content store, for demos and deterministic tests.
#[derive(Debug, Default)]
pub struct MemoryFetch {
    metadata: HashMap<Slug, AssetMetadata>,
    blobs: HashMap<ContentHash, Bytes>,
}

impl MemoryFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_metadata(&mut self, slug: impl Into<Slug>, metadata: AssetMetadata) {
        self.metadata.insert(slug.into(), metadata);
    }

    pub fn put_blob(&mut self, hash: impl Into<ContentHash>, data: impl Into<Bytes>) {
        self.blobs.insert(hash.into(), data.into());
    }
}

impl Fetch for MemoryFetch {
    fn metadata(&self, slug: &Slug) -> Result<AssetMetadata, FetchError> {
        self.metadata
            .get(slug)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(slug.to_string()))
    }

    fn bytes(&self, hash: &ContentHash, range: Option<Range<u64>>) -> Result<Bytes, FetchError> {
        let blob = self
            .blobs
            .get(hash)
            .ok_or_else(|| FetchError::NotFound(hash.to_string()))?;
        match range {
            None => Ok(blob.clone()),
            Some(range) => {
                if range.end > blob.len() as u64 || range.start > range.end {
                    return Err(FetchError::BadRange {
                        hash: hash.to_string(),
                        start: range.start,
                        end: range.end,
                        len: blob.len() as u64,
                    });
                }
                Ok(blob.slice(range.start as usize..range.end as usize))
            }
        }
    }
}
