use std::collections::HashMap;

use lodestream_scene::Slug;

use crate::error::Error;
use crate::metadata::AssetMetadata;

/// Quality actually materialized so far for one entity.
///
/// Created when the entity's metadata task completes and updated by every
/// later completion for that entity. Pending sibling tasks read the derived
/// error bound through progress propagation, never through each other.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProgress {
    reference_error: f64,
    base_ready: bool,
    texture_levels_done: usize,
    texture_levels_total: usize,
    refined_bytes: u64,
    refinement_total: u64,
    refinement_ops: u64,
}

impl EntityProgress {
    pub fn new(metadata: &AssetMetadata) -> Self {
        Self {
            reference_error: metadata.reference_error,
            base_ready: false,
            texture_levels_done: 0,
            texture_levels_total: metadata.atlas.levels.len(),
            refined_bytes: 0,
            refinement_total: metadata.refinement.as_ref().map_or(0, |r| r.size),
            refinement_ops: 0,
        }
    }

    /// Base mesh materialized, with atlas levels `0..levels_done` resident.
    pub fn record_base(&mut self, levels_done: usize) {
        self.base_ready = true;
        self.texture_levels_done = self.texture_levels_done.max(levels_done);
    }

    pub fn record_texture_level(&mut self, level: usize) {
        self.texture_levels_done = self.texture_levels_done.max(level + 1);
    }

    pub fn record_refinement(&mut self, bytes: u64, ops: u64) {
        self.refined_bytes = (self.refined_bytes + bytes).min(self.refinement_total);
        self.refinement_ops += ops;
    }

    pub fn reference_error(&self) -> f64 {
        self.reference_error
    }

    /// Refinement operations applied so far; a proxy for the triangle count
    /// the renderer has materialized.
    pub fn refinement_ops(&self) -> u64 {
        self.refinement_ops
    }

    /// Fraction of the entity's streamable detail that is resident, averaged
    /// over the streams the asset actually has. Zero until the base mesh is
    /// materialized.
    fn resolved_fraction(&self) -> f64 {
        if !self.base_ready {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut streams = 0;
        if self.texture_levels_total > 0 {
            sum += self.texture_levels_done as f64 / self.texture_levels_total as f64;
            streams += 1;
        }
        if self.refinement_total > 0 {
            sum += self.refined_bytes as f64 / self.refinement_total as f64;
            streams += 1;
        }
        if streams == 0 {
            // Base mesh alone is everything this asset offers.
            1.0
        } else {
            (sum / streams as f64).clamp(0.0, 1.0)
        }
    }

    /// Error bound still unresolved for this entity.
    pub fn achieved_error(&self) -> f64 {
        self.reference_error * (1.0 - self.resolved_fraction())
    }
}

/// Scheduler-owned table of per-entity progress, looked up by slug.
#[derive(Debug, Default)]
pub struct ProgressTable {
    entries: HashMap<Slug, EntityProgress>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slug: Slug, progress: EntityProgress) {
        self.entries.insert(slug, progress);
    }

    pub fn get(&self, slug: &Slug) -> Option<&EntityProgress> {
        self.entries.get(slug)
    }

    /// Mutable lookup that treats a missing record as a fatal invariant
    /// violation: chain steps past metadata always have one.
    pub fn get_mut(&mut self, slug: &Slug) -> Result<&mut EntityProgress, Error> {
        self.entries
            .get_mut(slug)
            .ok_or_else(|| Error::ProgressStateInvariant(slug.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
