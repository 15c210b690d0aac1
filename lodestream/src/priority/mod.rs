mod strategy;

pub use strategy::{Metric, Strategy, Weights};

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use lodestream_scene::{Slug, VisibilitySnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::task::{Category, Task};

/// Raw metric values for one task against one snapshot. Indices 0..3 of the
/// per-instant arrays correspond to now and the two prediction horizons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub solid_angle: [f64; 3],
    pub view_alignment: [f64; 3],
    pub perceptual_error: f64,
}

impl Metrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SolidAngleNow => self.solid_angle[0],
            Metric::SolidAngleNear => self.solid_angle[1],
            Metric::SolidAngleFar => self.solid_angle[2],
            Metric::ViewAlignmentNow => self.view_alignment[0],
            Metric::ViewAlignmentNear => self.view_alignment[1],
            Metric::ViewAlignmentFar => self.view_alignment[2],
            Metric::PerceptualError => self.perceptual_error,
        }
    }
}

/// Entity-level visibility metrics, shared by every task of that entity.
#[derive(Debug, Clone, Copy, Default)]
struct VisibilityMetrics {
    solid_angle: [f64; 3],
    view_alignment: [f64; 3],
}

/// Turns a visibility snapshot plus a pending set into top-K picks.
///
/// The strategy is fixed at construction; there is no global selected
/// strategy. Scoring is pure apart from the RNG behind the uniform-random
/// strategy, which tests can seed.
#[derive(Debug)]
pub struct PriorityEngine {
    strategy: Strategy,
    rng: StdRng,
    metric_evals: u64,
}

impl PriorityEngine {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            rng: StdRng::from_os_rng(),
            metric_evals: 0,
        }
    }

    /// Engine with a deterministic RNG, for reproducible selection.
    pub fn seeded(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: StdRng::seed_from_u64(seed),
            metric_evals: 0,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Number of per-task metric evaluations performed so far. Stays zero
    /// under the uniform-random strategy.
    pub fn metric_evals(&self) -> u64 {
        self.metric_evals
    }

    /// Pick the up-to-`k` most valuable pending tasks, returned as indices
    /// into `pending`. Ties break by submission order, first submitted wins.
    pub fn select(
        &mut self,
        snapshot: &VisibilitySnapshot,
        pending: &[Task],
        k: usize,
    ) -> Vec<usize> {
        let k = k.min(pending.len());
        if k == 0 {
            return Vec::new();
        }

        // Metric evaluation cost scales with the pending set; under random
        // selection it buys nothing, so sample directly.
        if self.strategy == Strategy::UniformRandom {
            return rand::seq::index::sample(&mut self.rng, pending.len(), k).into_vec();
        }

        // Visibility is a property of the entity, so evaluate it once per
        // distinct slug and reuse it across that entity's tasks.
        let mut per_entity: HashMap<&Slug, VisibilityMetrics> = HashMap::new();
        let mut scored: Vec<(usize, f64, u64)> = pending
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let visibility = match per_entity.entry(task.slug()) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        *entry.insert(visibility_metrics(snapshot, task.slug()))
                    }
                };
                self.metric_evals += 1;
                let metrics = Metrics {
                    solid_angle: visibility.solid_angle,
                    view_alignment: visibility.view_alignment,
                    perceptual_error: task.benefit().error_ratio(),
                };
                let mut score = self.strategy.combine(&metrics);
                if task.category() == Category::Download {
                    // Benefit per byte for transfer work.
                    score /= task.cost().max(1) as f64;
                }
                (index, score, task.seq())
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        scored.truncate(k);
        scored.into_iter().map(|(index, _, _)| index).collect()
    }
}

fn visibility_metrics(snapshot: &VisibilitySnapshot, slug: &Slug) -> VisibilityMetrics {
    let Some(sphere) = snapshot.bounds(slug) else {
        // Entity not in the scene yet: no visible value.
        return VisibilityMetrics::default();
    };
    let mut metrics = VisibilityMetrics::default();
    for (i, pose) in snapshot.poses().iter().enumerate() {
        metrics.solid_angle[i] = sphere.solid_angle_from(pose.position);
        metrics.view_alignment[i] = pose.view_alignment(sphere.center);
    }
    metrics
}
