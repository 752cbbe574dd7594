//! Execution contexts for deferred requests.
//!
//! The scheduler hands a one-shot task and a delay to an [`Executor`]; the
//! executor decides where the task runs. Hosts with a UI-affine context
//! implement the trait over it. [`TokioExecutor`] covers async hosts and
//! [`ManualExecutor`] drives virtual time in tests.

use std::sync::Mutex;
use std::time::Duration;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, task: Task);
}

/// Runs deferred tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running in.
    ///
    /// # Errors
    /// Returns an error when called outside of a tokio runtime.
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        tokio::runtime::Handle::try_current().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

struct QueuedTask {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ManualQueue {
    elapsed: Duration,
    next_seq: u64,
    tasks: Vec<QueuedTask>,
}

/// Virtual-time executor.
///
/// Nothing runs until [`ManualExecutor::advance`] moves time past a task's
/// deadline. Due tasks run on the caller's thread in deadline order.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<ManualQueue>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward and run every task that became due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut queue = self.lock();
            queue.elapsed += by;
            queue.elapsed
        };

        let mut ran = 0;
        // Pop one task at a time so tasks may schedule more work
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }
        ran
    }

    /// Tasks still waiting for their deadline.
    pub fn queued(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut queue = self.lock();
        let index = queue
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(queue.tasks.swap_remove(index).task)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Executor for ManualExecutor {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut queue = self.lock();
        let due = queue.elapsed + delay;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.push(QueuedTask { due, seq, task });
    }
}

impl std::fmt::Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.lock();
        f.debug_struct("ManualExecutor")
            .field("elapsed", &queue.elapsed)
            .field("queued", &queue.tasks.len())
            .finish()
    }
}
