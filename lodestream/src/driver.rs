use std::time::Instant;

use lodestream_scene::VisibilitySnapshot;

use crate::backend::ExecBackend;
use crate::config::CadenceConfig;
use crate::error::Error;
use crate::multiplex::MultiplexPool;
use crate::priority::PriorityEngine;
use crate::task::Completion;

/// Drives [`MultiplexPool::poll`] on an adaptive cadence until the pool
/// drains: a tick that took `T` schedules the next one `T * backoff` later,
/// clamped to the configured range.
#[derive(Debug, Clone, Copy)]
pub struct PollDriver {
    cadence: CadenceConfig,
}

impl PollDriver {
    pub fn new(cadence: CadenceConfig) -> Self {
        Self { cadence }
    }

    /// Poll until a tick yields no completions and every pool is empty.
    /// `snapshot` is sampled fresh each tick; completions stream into
    /// `on_complete` as they happen. Returns the total completion count.
    pub async fn run<B, S, F>(
        &self,
        pool: &mut MultiplexPool<B>,
        engine: &mut PriorityEngine,
        mut snapshot: S,
        mut on_complete: F,
    ) -> Result<usize, Error>
    where
        B: ExecBackend,
        S: FnMut() -> VisibilitySnapshot,
        F: FnMut(Completion),
    {
        let mut total = 0;
        loop {
            let started = Instant::now();
            let completions = pool.poll(&snapshot(), engine)?;
            let elapsed = started.elapsed();

            let drained = completions.is_empty() && pool.empty();
            total += completions.len();
            for completion in completions {
                on_complete(completion);
            }
            if drained {
                tracing::debug!("finished loading after {total} completions");
                return Ok(total);
            }
            tokio::time::sleep(self.cadence.delay_after(elapsed)).await;
        }
    }
}
