//! The deferred-execution seam. A [`Future`](crate::Future) never calls
//! reactions itself; it hands a [`Task`] to its scheduler and returns.
use crate::channel::ThreadScheduler;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after the caller's synchronous execution has unwound.
///
/// Implementations must never run `task` inside `defer` itself.
pub trait Scheduler: Send + Sync {
    fn defer(&self, task: Task);
}

impl<F> Scheduler for F
where
    F: Fn(Task) + Send + Sync,
{
    fn defer(&self, task: Task) {
        self(task)
    }
}

/// The process-wide scheduler used by [`Future::new`](crate::Future::new).
///
/// Started on first use: a [`ThreadScheduler`] whose worker is named
/// `future-out-dispatch`.
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    static DEFAULT: OnceLock<Arc<ThreadScheduler>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(ThreadScheduler::new("future-out-dispatch")))
        .clone()
}

/// A FIFO task queue drained by its owner.
///
/// Nothing runs until [`run_next`](Self::run_next) or
/// [`run_until_idle`](Self::run_until_idle) is called, which makes it the
/// scheduler of choice for tests and for embedding into an existing loop.
/// Clones share the same queue.
///
/// # Examples
///
/// ```
/// use future_out::{ManualScheduler, Scheduler};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let scheduler = ManualScheduler::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = hits.clone();
/// scheduler.defer(Box::new(move || { h.fetch_add(1, Ordering::SeqCst); }));
/// assert_eq!(hits.load(Ordering::SeqCst), 0);
/// assert_eq!(scheduler.run_until_idle(), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Runs the oldest queued task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        // The lock must be released before the task runs: tasks defer more tasks.
        let task = self.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including tasks queued along the
    /// way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualScheduler, Scheduler, Task};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_manual_scheduler_runs_in_fifo_order() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        for i in 0..3 {
            let log = log.clone();
            scheduler.defer(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert_eq!(scheduler.pending(), 3);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_manual_scheduler_drains_nested_tasks() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        let (inner_scheduler, inner_log) = (scheduler.clone(), log.clone());
        scheduler.defer(Box::new(move || {
            inner_log.lock().unwrap().push("outer");
            let log = inner_log.clone();
            inner_scheduler.defer(Box::new(move || log.lock().unwrap().push("inner")));
        }));
        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
        assert!(!scheduler.run_next());
    }

    #[test]
    fn test_closure_is_a_scheduler() {
        let stash: Arc<Mutex<Vec<Task>>> = Arc::new(Mutex::new(vec![]));
        let sink = stash.clone();
        let scheduler = move |task: Task| sink.lock().unwrap().push(task);
        scheduler.defer(Box::new(|| {}));
        assert_eq!(stash.lock().unwrap().len(), 1);
    }
}
