pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod materialize;
pub mod metadata;
pub mod multiplex;
pub mod pool;
pub mod priority;
pub mod progress;
pub mod refine;
pub mod task;

#[cfg(test)]
mod tests;

pub use backend::{ExecBackend, InlineBackend, ManualBackend, OpHandle, TokioBackend};
pub use config::{CadenceConfig, SchedulerConfig, StrategyConfig};
pub use driver::PollDriver;
pub use error::{Error, FetchError, TaskError};
pub use fetch::{Fetch, MemoryFetch};
pub use materialize::{Artifact, Materializer, NullMaterializer};
pub use metadata::{AssetMetadata, ContentHash, RefinementStream, TextureAtlas, TextureLevel};
pub use multiplex::MultiplexPool;
pub use pool::TaskPool;
pub use priority::{Metric, Metrics, PriorityEngine, Strategy, Weights};
pub use progress::{EntityProgress, ProgressTable};
pub use refine::{ChunkCarry, DecodedChunk, FixedWidthDecoder, RefinementDecoder, RefinementOp};
pub use task::{BenefitInputs, Category, Completion, RunContext, Task, TaskState};

pub use lodestream_scene::{BoundingSphere, CameraPose, Slug, VisibilitySnapshot};
