use std::collections::HashMap;

use lodestream_scene::{Slug, VisibilitySnapshot};

use crate::backend::ExecBackend;
use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::pool::TaskPool;
use crate::priority::PriorityEngine;
use crate::progress::{EntityProgress, ProgressTable};
use crate::task::{Category, Completion, ProgressEvent, RunContext, Task};

/// Routes tasks to their category's pool, fans `poll` out across all pools,
/// runs completed tasks' chaining logic, and propagates per-entity progress
/// to sibling pending tasks.
///
/// All state mutation happens from the single thread calling `poll`; no
/// internal locking.
#[derive(Debug)]
pub struct MultiplexPool<B: ExecBackend> {
    pools: HashMap<Category, TaskPool<B::Handle>>,
    progress: ProgressTable,
    backend: B,
    ctx: RunContext,
    next_seq: u64,
}

impl<B: ExecBackend> MultiplexPool<B> {
    pub fn new(config: &SchedulerConfig, backend: B, ctx: RunContext) -> Self {
        Self::with_limits(
            [
                (Category::Download, config.download_slots),
                (Category::Load, config.load_slots),
            ],
            backend,
            ctx,
        )
    }

    /// Build with an explicit category set. A task later submitted with a
    /// category missing here is rejected as a programming error.
    pub fn with_limits(
        limits: impl IntoIterator<Item = (Category, usize)>,
        backend: B,
        ctx: RunContext,
    ) -> Self {
        Self {
            pools: limits
                .into_iter()
                .map(|(category, limit)| (category, TaskPool::new(limit)))
                .collect(),
            progress: ProgressTable::new(),
            backend,
            ctx,
            next_seq: 0,
        }
    }

    /// Add a task to its category's pending set, stamping the global
    /// submission sequence number used for tie-breaks.
    pub fn submit(&mut self, mut task: Task) -> Result<(), Error> {
        task.set_seq(self.next_seq);
        self.next_seq += 1;
        // Late joiners of an already-streaming entity start from its
        // current quality, not from zero.
        if let Some(progress) = self.progress.get(task.slug()) {
            task.benefit_mut()
                .update(progress.achieved_error(), progress.reference_error());
        }
        let category = task.category();
        let pool = self
            .pools
            .get_mut(&category)
            .ok_or(Error::UnknownCategory(category))?;
        pool.submit(task);
        Ok(())
    }

    /// True iff every pool has neither pending nor running tasks.
    pub fn empty(&self) -> bool {
        self.pools.values().all(TaskPool::empty)
    }

    pub fn progress(&self, slug: &Slug) -> Option<&EntityProgress> {
        self.progress.get(slug)
    }

    /// Pending and running tasks for one entity across every pool.
    pub fn tasks_for_slug(&self, slug: &Slug) -> Vec<&Task> {
        let mut tasks = Vec::new();
        for category in Category::ALL {
            if let Some(pool) = self.pools.get(&category) {
                tasks.extend(pool.tasks().filter(|task| task.slug() == slug));
            }
        }
        tasks
    }

    /// One scheduling tick across all pools. Completions trigger chaining
    /// (which may submit successors back in here) and progress propagation;
    /// the returned events are what the renderer acts on.
    pub fn poll(
        &mut self,
        snapshot: &VisibilitySnapshot,
        engine: &mut PriorityEngine,
    ) -> Result<Vec<Completion>, Error> {
        let mut finished = Vec::new();
        for category in Category::ALL {
            if let Some(pool) = self.pools.get_mut(&category) {
                finished.extend(pool.poll(snapshot, engine, &self.backend, &self.ctx));
            }
        }

        let mut completions = Vec::new();
        for (task, output) in finished {
            let slug = task.slug().clone();
            let advance = task.finished(output);
            self.apply_progress(&slug, advance.progress)?;
            for successor in advance.successors {
                self.submit(successor)?;
            }
            if let Some(completion) = advance.completion {
                completions.push(completion);
            }
        }
        Ok(completions)
    }

    /// Update the entity's quality record, then rewrite the benefit inputs
    /// of every other pending task for it so no stale estimates survive.
    fn apply_progress(&mut self, slug: &Slug, event: ProgressEvent) -> Result<(), Error> {
        match event {
            ProgressEvent::None => return Ok(()),
            ProgressEvent::Init(metadata) => {
                self.progress
                    .insert(slug.clone(), EntityProgress::new(&metadata));
            }
            ProgressEvent::Base { levels_done } => {
                self.progress.get_mut(slug)?.record_base(levels_done);
            }
            ProgressEvent::Texture { level } => {
                self.progress.get_mut(slug)?.record_texture_level(level);
            }
            ProgressEvent::Refinement { bytes, ops } => {
                self.progress.get_mut(slug)?.record_refinement(bytes, ops);
            }
        }

        let record = self
            .progress
            .get(slug)
            .ok_or_else(|| Error::ProgressStateInvariant(slug.clone()))?;
        let (achieved, reference) = (record.achieved_error(), record.reference_error());
        for pool in self.pools.values_mut() {
            for task in pool.pending_for_mut(slug) {
                task.benefit_mut().update(achieved, reference);
            }
        }
        Ok(())
    }
}
