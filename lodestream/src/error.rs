use thiserror::Error;

use crate::task::Category;

/// Errors surfaced by the scheduler itself.
///
/// Configuration and category errors abort startup/submission; a
/// [`Error::ProgressStateInvariant`] means the per-entity quality table is
/// inconsistent with the pending task set and is not recoverable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid scheduler configuration: {0}")]
    ConfigValidation(String),

    #[error("no pool registered for task category {0:?}")]
    UnknownCategory(Category),

    #[error("no progress record for entity {0}")]
    ProgressStateInvariant(lodestream_scene::Slug),
}

/// Failure of a single task, reported by the execution backend.
///
/// Isolated to the failing task and its unspawned successors; the task is
/// marked failed and dropped, with no retry at this layer.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("execution backend dropped the task")]
    BackendGone,
}

/// Terminal fetch failure. The fetch collaborator retries transient errors
/// internally; anything surfacing here already exhausted those retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("content {0} not found")]
    NotFound(String),

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("range {start}..{end} outside content {hash} of {len} bytes")]
    BadRange {
        hash: String,
        start: u64,
        end: u64,
        len: u64,
    },
}

#[derive(Debug, Error)]
#[error("materialize failed: {0}")]
pub struct MaterializeError(pub String);

#[derive(Debug, Error)]
#[error("refinement decode failed: {0}")]
pub struct DecodeError(pub String);
