pub mod metadata;
pub mod mesh;
pub mod refinement;
pub mod texture;

use std::sync::Arc;

use bytes::Bytes;
use lodestream_scene::Slug;

use crate::backend::WorkFn;
use crate::fetch::Fetch;
use crate::materialize::{Artifact, Materializer};
use crate::metadata::AssetMetadata;
use crate::refine::{ChunkCarry, DecodedChunk, RefinementDecoder, RefinementOp};

/// Coarse task class determining which bounded pool executes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Network transfer work; concurrency capped low to bound connections.
    Download,
    /// Local conversion of already-downloaded data.
    Load,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Download, Category::Load];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-task copy of the entity's achieved quality, rewritten by progress
/// propagation whenever a sibling task completes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BenefitInputs {
    pub achieved_error: f64,
    pub reference_error: f64,
}

impl BenefitInputs {
    pub(crate) fn update(&mut self, achieved_error: f64, reference_error: f64) {
        self.achieved_error = achieved_error;
        self.reference_error = reference_error;
    }

    /// The `perceptual_error` metric: `1 - achieved / reference`, clamped to
    /// [0, 1]. Zero while no progress record exists for the entity.
    pub fn error_ratio(&self) -> f64 {
        if self.reference_error <= 0.0 {
            return 0.0;
        }
        (1.0 - self.achieved_error / self.reference_error).clamp(0.0, 1.0)
    }
}

/// The five chain stages, each carrying what its work closure needs.
#[derive(Debug, Clone)]
pub enum TaskKind {
    MetadataFetch,
    MeshFetch {
        metadata: Arc<AssetMetadata>,
    },
    MeshMaterialize {
        metadata: Arc<AssetMetadata>,
        mesh: Bytes,
        base_texture: Bytes,
    },
    TextureLevelFetch {
        metadata: Arc<AssetMetadata>,
        level: usize,
    },
    RefinementChunkFetch {
        metadata: Arc<AssetMetadata>,
        offset: u64,
        carry: ChunkCarry,
    },
}

impl TaskKind {
    pub fn category(&self) -> Category {
        match self {
            TaskKind::MeshMaterialize { .. } => Category::Load,
            _ => Category::Download,
        }
    }
}

/// Entity-scoped unit of asynchronous work.
///
/// Owned by exactly one pool at a time; completion hands it to its chaining
/// logic, which consumes it and may spawn successors.
#[derive(Debug, Clone)]
pub struct Task {
    slug: Slug,
    category: Category,
    state: TaskState,
    seq: u64,
    benefit: BenefitInputs,
    kind: TaskKind,
}

impl Task {
    /// Head of every chain: fetch the asset's metadata.
    pub fn metadata_fetch(slug: Slug) -> Self {
        Self::new(slug, TaskKind::MetadataFetch)
    }

    pub(crate) fn new(slug: Slug, kind: TaskKind) -> Self {
        Self {
            slug,
            category: kind.category(),
            state: TaskState::Pending,
            seq: 0,
            benefit: BenefitInputs::default(),
            kind,
        }
    }

    pub fn slug(&self) -> &Slug {
        &self.slug
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Global submission sequence number; the deterministic tie-break for
    /// top-K selection.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn benefit(&self) -> &BenefitInputs {
        &self.benefit
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn benefit_mut(&mut self) -> &mut BenefitInputs {
        &mut self.benefit
    }

    /// Expected transfer/work size in bytes, normalizing Download benefit.
    pub fn cost(&self) -> u64 {
        match &self.kind {
            TaskKind::MetadataFetch => metadata::METADATA_COST,
            TaskKind::MeshFetch { metadata } => mesh::fetch_cost(metadata),
            TaskKind::MeshMaterialize { mesh, base_texture, .. } => {
                (mesh.len() + base_texture.len()) as u64
            }
            TaskKind::TextureLevelFetch { metadata, level } => {
                texture::cost(metadata, *level)
            }
            TaskKind::RefinementChunkFetch {
                metadata, offset, ..
            } => refinement::cost(metadata, *offset),
        }
    }

    /// Build the closure the execution backend runs for this task.
    pub(crate) fn work(&self, ctx: &RunContext) -> WorkFn {
        match &self.kind {
            TaskKind::MetadataFetch => metadata::work(&self.slug, ctx),
            TaskKind::MeshFetch { metadata } => mesh::fetch_work(metadata, ctx),
            TaskKind::MeshMaterialize {
                mesh, base_texture, ..
            } => mesh::materialize_work(&self.slug, mesh.clone(), base_texture.clone(), ctx),
            TaskKind::TextureLevelFetch { metadata, level } => {
                texture::work(&self.slug, metadata, *level, ctx)
            }
            TaskKind::RefinementChunkFetch {
                metadata,
                offset,
                carry,
            } => refinement::work(metadata, *offset, carry.clone(), ctx),
        }
    }

    /// Chaining logic, invoked exactly once on the scheduling thread after
    /// the backend reported success. Consumes the task.
    pub(crate) fn finished(self, output: TaskOutput) -> Advance {
        match (self.kind, output) {
            (TaskKind::MetadataFetch, TaskOutput::Metadata(metadata)) => {
                metadata::finished(self.slug, metadata)
            }
            (TaskKind::MeshFetch { metadata }, TaskOutput::MeshData { mesh, base_texture }) => {
                mesh::fetch_finished(self.slug, metadata, mesh, base_texture)
            }
            (TaskKind::MeshMaterialize { metadata, .. }, TaskOutput::MeshArtifact(artifact)) => {
                mesh::materialize_finished(self.slug, metadata, artifact)
            }
            (
                TaskKind::TextureLevelFetch { metadata, level },
                TaskOutput::TextureArtifact(artifact),
            ) => texture::finished(self.slug, metadata, level, artifact),
            (
                TaskKind::RefinementChunkFetch {
                    metadata, offset, ..
                },
                TaskOutput::RefinementChunk(decoded),
            ) => refinement::finished(self.slug, metadata, offset, decoded),
            (kind, output) => {
                // The backend echoes back what the work closure produced, so
                // a mismatch means a task module wired the wrong output.
                unreachable!("task kind {kind:?} completed with mismatched output {output:?}")
            }
        }
    }
}

/// Data a completed task hands back through the execution backend.
#[derive(Debug)]
pub enum TaskOutput {
    Metadata(Arc<AssetMetadata>),
    MeshData { mesh: Bytes, base_texture: Bytes },
    MeshArtifact(Artifact),
    TextureArtifact(Artifact),
    RefinementChunk(DecodedChunk),
}

/// What the outside world learns from one completed chain step.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Metadata {
        slug: Slug,
    },
    Mesh {
        slug: Slug,
        artifact: Artifact,
    },
    TextureLevel {
        slug: Slug,
        level: usize,
        artifact: Artifact,
    },
    RefinementChunk {
        slug: Slug,
        offset: u64,
        ops: Vec<RefinementOp>,
    },
}

impl Completion {
    pub fn slug(&self) -> &Slug {
        match self {
            Completion::Metadata { slug }
            | Completion::Mesh { slug, .. }
            | Completion::TextureLevel { slug, .. }
            | Completion::RefinementChunk { slug, .. } => slug,
        }
    }
}

/// Everything a chain step produces: successor tasks, the progress update to
/// apply before they are scored, and an optional externally visible event.
#[derive(Debug)]
pub(crate) struct Advance {
    pub successors: Vec<Task>,
    pub progress: ProgressEvent,
    pub completion: Option<Completion>,
}

/// How a completed step moves the entity's progress record.
#[derive(Debug)]
pub(crate) enum ProgressEvent {
    None,
    /// First completion for the entity: create the record.
    Init(Arc<AssetMetadata>),
    /// Base mesh materialized with `levels_done` atlas levels resident.
    Base { levels_done: usize },
    Texture { level: usize },
    Refinement { bytes: u64, ops: u64 },
}

/// Collaborators a task's work closure captures: fetch, materialize, and
/// refinement decode. Cheap to clone per dispatch.
#[derive(Clone)]
pub struct RunContext {
    pub fetch: Arc<dyn Fetch>,
    pub materializer: Arc<dyn Materializer>,
    pub decoder: Arc<dyn RefinementDecoder>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext").finish_non_exhaustive()
    }
}
