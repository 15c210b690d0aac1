use lodestream_scene::{Slug, VisibilitySnapshot};

use crate::backend::{ExecBackend, OpHandle};
use crate::priority::PriorityEngine;
use crate::task::{RunContext, Task, TaskOutput, TaskState};

/// Bounded-concurrency scheduler for one task category.
///
/// Tasks flow pending -> running -> out; the pool never re-queues anything
/// by itself, re-submission only happens through chaining.
#[derive(Debug)]
pub struct TaskPool<H: OpHandle> {
    limit: usize,
    pending: Vec<Task>,
    running: Vec<Running<H>>,
}

#[derive(Debug)]
struct Running<H> {
    task: Task,
    handle: H,
}

impl<H: OpHandle> TaskPool<H> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            pending: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn submit(&mut self, task: Task) {
        self.pending.push(task);
    }

    pub fn empty(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    /// Pending and running tasks, pending first.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.pending
            .iter()
            .chain(self.running.iter().map(|running| &running.task))
    }

    /// Pending tasks for one entity; progress propagation rewrites their
    /// benefit inputs through this.
    pub(crate) fn pending_for_mut(&mut self, slug: &Slug) -> impl Iterator<Item = &mut Task> {
        self.pending.iter_mut().filter(move |task| task.slug() == slug)
    }

    /// One scheduling tick, never blocking: harvest ready handles first,
    /// then fill free slots from the pending set by priority.
    pub fn poll<B>(
        &mut self,
        snapshot: &VisibilitySnapshot,
        engine: &mut PriorityEngine,
        backend: &B,
        ctx: &RunContext,
    ) -> Vec<(Task, TaskOutput)>
    where
        B: ExecBackend<Handle = H>,
    {
        let mut completed = Vec::new();

        let mut index = 0;
        while index < self.running.len() {
            if !self.running[index].handle.is_ready() {
                index += 1;
                continue;
            }
            let Running { mut task, handle } = self.running.remove(index);
            match handle.take() {
                Ok(output) => {
                    task.set_state(TaskState::Completed);
                    completed.push((task, output));
                }
                Err(error) => {
                    // Chain stops here for this branch; siblings unaffected.
                    task.set_state(TaskState::Failed);
                    tracing::warn!("task for {} failed: {error}", task.slug());
                }
            }
        }

        if self.running.len() >= self.limit {
            return completed;
        }

        let slots = self.limit - self.running.len();
        let mut picks = engine.select(snapshot, &self.pending, slots);
        // Remove back-to-front so earlier indices stay valid.
        picks.sort_unstable_by(|a, b| b.cmp(a));
        for index in picks {
            let mut task = self.pending.remove(index);
            task.set_state(TaskState::Running);
            tracing::trace!("dispatching {:?} task for {}", task.category(), task.slug());
            let handle = backend.submit(task.work(ctx));
            self.running.push(Running { task, handle });
        }

        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use glam::Vec3;
    use lodestream_scene::{BoundingSphere, CameraPose};

    use crate::backend::ManualBackend;
    use crate::fetch::MemoryFetch;
    use crate::materialize::NullMaterializer;
    use crate::metadata::{AssetMetadata, ContentHash, TextureAtlas};
    use crate::priority::{Metric, Strategy};
    use crate::refine::FixedWidthDecoder;

    fn context() -> RunContext {
        let mut fetch = MemoryFetch::new();
        for i in 0..16 {
            fetch.put_metadata(
                format!("m{i}"),
                AssetMetadata {
                    mesh: ContentHash(format!("mesh{i}")),
                    mesh_size: 10,
                    atlas: TextureAtlas {
                        hash: ContentHash(format!("atlas{i}")),
                        levels: Vec::new(),
                    },
                    refinement: None,
                    reference_error: 10.0,
                },
            );
        }
        RunContext {
            fetch: Arc::new(fetch),
            materializer: Arc::new(NullMaterializer),
            decoder: Arc::new(FixedWidthDecoder { op_size: 4 }),
        }
    }

    fn snapshot() -> VisibilitySnapshot {
        let mut snapshot = VisibilitySnapshot::fixed(CameraPose::new(Vec3::ZERO, Vec3::X));
        for i in 0..16 {
            snapshot.insert(
                Slug::new(format!("m{i}")),
                BoundingSphere::new(Vec3::new(5.0 + i as f32, 0.0, 0.0), 1.0),
            );
        }
        snapshot
    }

    fn engine() -> PriorityEngine {
        PriorityEngine::seeded(Strategy::Single(Metric::SolidAngleNow), 11)
    }

    #[test]
    fn running_never_exceeds_limit() {
        let backend = ManualBackend::new();
        let ctx = context();
        let snapshot = snapshot();
        let mut engine = engine();
        let mut pool: TaskPool<_> = TaskPool::new(3);

        for i in 0..10 {
            pool.submit(Task::metadata_fetch(Slug::new(format!("m{i}"))));
        }

        assert!(pool.poll(&snapshot, &mut engine, &backend, &ctx).is_empty());
        assert_eq!(pool.running_len(), 3);
        assert_eq!(pool.pending_len(), 7);

        // Saturated pool dispatches nothing further.
        assert!(pool.poll(&snapshot, &mut engine, &backend, &ctx).is_empty());
        assert_eq!(pool.running_len(), 3);

        // One completion frees exactly one slot.
        backend.release_next();
        let done = pool.poll(&snapshot, &mut engine, &backend, &ctx);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].0.state(), TaskState::Completed);
        assert_eq!(pool.running_len(), 3);
        assert_eq!(pool.pending_len(), 6);

        while !pool.empty() {
            backend.release_all();
            pool.poll(&snapshot, &mut engine, &backend, &ctx);
            assert!(pool.running_len() <= pool.limit());
        }
    }

    #[test]
    fn idle_poll_is_idempotent() {
        let backend = ManualBackend::new();
        let ctx = context();
        let snapshot = snapshot();
        let mut engine = engine();
        let mut pool: TaskPool<_> = TaskPool::new(2);

        for i in 0..4 {
            pool.submit(Task::metadata_fetch(Slug::new(format!("m{i}"))));
        }
        pool.poll(&snapshot, &mut engine, &backend, &ctx);
        let running_before = pool.running_len();
        let pending_before = pool.pending_len();
        let dispatched_before = backend.in_flight();

        // Nothing ready, no free slots: no completions, no dispatches.
        for _ in 0..3 {
            assert!(pool.poll(&snapshot, &mut engine, &backend, &ctx).is_empty());
            assert_eq!(pool.running_len(), running_before);
            assert_eq!(pool.pending_len(), pending_before);
            assert_eq!(backend.in_flight(), dispatched_before);
        }
    }

    #[test]
    fn failed_task_is_dropped_silently() {
        let backend = ManualBackend::new();
        let mut fetch = MemoryFetch::new();
        // Metadata present for one entity only; the other fetch fails.
        fetch.put_metadata(
            "good",
            AssetMetadata {
                mesh: ContentHash::from("mesh"),
                mesh_size: 10,
                atlas: TextureAtlas {
                    hash: ContentHash::from("atlas"),
                    levels: Vec::new(),
                },
                refinement: None,
                reference_error: 10.0,
            },
        );
        let ctx = RunContext {
            fetch: Arc::new(fetch),
            materializer: Arc::new(NullMaterializer),
            decoder: Arc::new(FixedWidthDecoder { op_size: 4 }),
        };
        let snapshot = VisibilitySnapshot::fixed(CameraPose::new(Vec3::ZERO, Vec3::X));
        let mut engine = engine();
        let mut pool: TaskPool<_> = TaskPool::new(2);
        pool.submit(Task::metadata_fetch(Slug::new("good")));
        pool.submit(Task::metadata_fetch(Slug::new("missing")));

        pool.poll(&snapshot, &mut engine, &backend, &ctx);
        backend.release_all();
        let done = pool.poll(&snapshot, &mut engine, &backend, &ctx);

        assert_eq!(done.len(), 1);
        assert_eq!(done[0].0.slug(), &Slug::new("good"));
        assert!(pool.empty());
    }
}
