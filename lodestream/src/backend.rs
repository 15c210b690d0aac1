use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::TaskError;
use crate::task::TaskOutput;

/// Closure executed on the backend's workers for one task.
pub type WorkFn = Box<dyn FnOnce() -> Result<TaskOutput, TaskError> + Send + 'static>;

/// Handle to one in-flight unit of work.
pub trait OpHandle: std::fmt::Debug {
    /// Non-blocking readiness check, called from the scheduling thread while
    /// the work runs elsewhere.
    fn is_ready(&self) -> bool;

    /// Consume the handle and surface the result. Only called once
    /// [`OpHandle::is_ready`] returned true, so it never waits.
    fn take(self) -> Result<TaskOutput, TaskError>;
}

/// Execution backend the scheduler dispatches work to.
///
/// The scheduler bounds how many handles it keeps outstanding per category;
/// raw parallelism is the backend's concern. Injected so tests can
/// substitute a synchronous, deterministic implementation.
pub trait ExecBackend {
    type Handle: OpHandle;

    fn submit(&self, work: WorkFn) -> Self::Handle;
}

/// Backend running work on a tokio runtime's blocking worker pool.
#[derive(Debug, Clone)]
pub struct TokioBackend {
    runtime: tokio::runtime::Handle,
}

impl TokioBackend {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }
}

impl Default for TokioBackend {
    fn default() -> Self {
        Self {
            runtime: tokio::runtime::Handle::current(),
        }
    }
}

impl ExecBackend for TokioBackend {
    type Handle = TokioHandle;

    fn submit(&self, work: WorkFn) -> TokioHandle {
        let (send, recv) = crossbeam_channel::bounded(1);
        self.runtime.spawn_blocking(move || {
            let _ = send.send(work());
        });
        TokioHandle {
            recv,
            done: RefCell::new(None),
        }
    }
}

#[derive(Debug)]
pub struct TokioHandle {
    recv: crossbeam_channel::Receiver<Result<TaskOutput, TaskError>>,
    done: RefCell<Option<Result<TaskOutput, TaskError>>>,
}

impl OpHandle for TokioHandle {
    fn is_ready(&self) -> bool {
        if self.done.borrow().is_some() {
            return true;
        }
        match self.recv.try_recv() {
            Ok(result) => {
                *self.done.borrow_mut() = Some(result);
                true
            }
            Err(crossbeam_channel::TryRecvError::Empty) => false,
            // Worker gone without sending: the task panicked or was aborted.
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                *self.done.borrow_mut() = Some(Err(TaskError::BackendGone));
                true
            }
        }
    }

    fn take(self) -> Result<TaskOutput, TaskError> {
        match self.done.into_inner() {
            Some(result) => result,
            None => self
                .recv
                .try_recv()
                .unwrap_or(Err(TaskError::BackendGone)),
        }
    }
}

/// Backend running every work item synchronously at submit; handles are
/// ready immediately. The deterministic stand-in for tests and demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineBackend;

impl ExecBackend for InlineBackend {
    type Handle = InlineHandle;

    fn submit(&self, work: WorkFn) -> InlineHandle {
        InlineHandle(work())
    }
}

#[derive(Debug)]
pub struct InlineHandle(Result<TaskOutput, TaskError>);

impl OpHandle for InlineHandle {
    fn is_ready(&self) -> bool {
        true
    }

    fn take(self) -> Result<TaskOutput, TaskError> {
        self.0
    }
}

/// Backend for tests that need work to stay in flight: work still runs
/// synchronously at submit, but handles only become ready once released.
#[derive(Debug, Default, Clone)]
pub struct ManualBackend {
    gates: Arc<Mutex<VecDeque<Arc<AtomicBool>>>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles not yet released.
    pub fn in_flight(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    /// Mark the oldest unreleased handle ready. Returns false when none is
    /// outstanding.
    pub fn release_next(&self) -> bool {
        match self.gates.lock().unwrap().pop_front() {
            Some(gate) => {
                gate.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&self) {
        while self.release_next() {}
    }
}

impl ExecBackend for ManualBackend {
    type Handle = ManualHandle;

    fn submit(&self, work: WorkFn) -> ManualHandle {
        let gate = Arc::new(AtomicBool::new(false));
        self.gates.lock().unwrap().push_back(gate.clone());
        ManualHandle {
            gate,
            result: work(),
        }
    }
}

#[derive(Debug)]
pub struct ManualHandle {
    gate: Arc<AtomicBool>,
    result: Result<TaskOutput, TaskError>,
}

impl OpHandle for ManualHandle {
    fn is_ready(&self) -> bool {
        self.gate.load(Ordering::SeqCst)
    }

    fn take(self) -> Result<TaskOutput, TaskError> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::Artifact;
    use lodestream_scene::Slug;

    fn artifact_work(name: &str) -> WorkFn {
        let artifact = Artifact {
            slug: Slug::new(name),
            locator: name.to_owned(),
        };
        Box::new(move || Ok(TaskOutput::MeshArtifact(artifact)))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tokio_backend_completes_work() {
        let backend = TokioBackend::default();
        let handle = backend.submit(artifact_work("a"));
        while !handle.is_ready() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert!(matches!(handle.take(), Ok(TaskOutput::MeshArtifact(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tokio_backend_surfaces_panic_as_backend_gone() {
        let backend = TokioBackend::default();
        let handle = backend.submit(Box::new(|| panic!("worker died")));
        while !handle.is_ready() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert!(matches!(handle.take(), Err(TaskError::BackendGone)));
    }

    #[test]
    fn manual_backend_gates_readiness_in_order() {
        let backend = ManualBackend::new();
        let first = backend.submit(artifact_work("a"));
        let second = backend.submit(artifact_work("b"));
        assert_eq!(backend.in_flight(), 2);
        assert!(!first.is_ready() && !second.is_ready());

        assert!(backend.release_next());
        assert!(first.is_ready());
        assert!(!second.is_ready());

        assert!(backend.release_next());
        assert!(second.is_ready());
        assert!(!backend.release_next());
    }
}
