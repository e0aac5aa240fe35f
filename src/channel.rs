//! A channel scheduler uses a multi-producer, single-consumer channel as its
//! backend. Producers live in every handle; the consumer is a worker thread
//! that runs tasks one after another in the order they were sent.
//!
use crate::scheduler::{Scheduler, Task};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{channel, Receiver, Sender},
        Mutex, PoisonError,
    },
    thread,
};

/// A [`Scheduler`] backed by a dedicated worker thread.
///
/// The worker exits once the scheduler is dropped and the queue is drained.
///
/// # Examples
///
/// ```
/// use future_out::{Future, Resolution, ThreadScheduler};
/// use futures::executor::block_on;
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(ThreadScheduler::new("doc-dispatch"));
/// let p = Future::<String, String>::with_scheduler(scheduler);
/// let shout = p.and_then(|s| Ok(Some(Resolution::Value(s.to_uppercase()))));
/// p.resolve("hi".into()).unwrap();
/// assert_eq!(block_on(shout.settled()), Ok("HI".to_string()));
/// ```
#[derive(Debug)]
pub struct ThreadScheduler {
    sender: Mutex<Sender<Task>>,
}

impl ThreadScheduler {
    /// Starts a worker thread named `name`.
    pub fn new(name: &str) -> Self {
        let (tx, rx) = channel::<Task>();
        let spawned = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(rx));
        if let Err(err) = spawned {
            // The receiver went down with the failed spawn; every `defer` will
            // report the closed channel.
            tracing::error!(worker = name, error = %err, "failed to spawn dispatch worker");
        }
        Self {
            sender: Mutex::new(tx),
        }
    }
}

fn run(receiver: Receiver<Task>) {
    for task in receiver {
        // The worker outlives a panicking task.
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("dispatch task panicked");
        }
    }
    tracing::trace!("dispatch worker exiting");
}

impl Scheduler for ThreadScheduler {
    fn defer(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.send(task).is_err() {
            tracing::warn!("dispatch worker is gone, task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadScheduler;
    use crate::Scheduler;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_thread_scheduler_runs_tasks_in_order_off_thread() {
        let scheduler = ThreadScheduler::new("test-dispatch");
        let (tx, rx) = channel();
        for i in 0..5 {
            let tx = tx.clone();
            scheduler.defer(Box::new(move || {
                let name = std::thread::current().name().map(str::to_owned);
                tx.send((i, name)).unwrap();
            }));
        }
        for i in 0..5 {
            let (got, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(got, i);
            assert_eq!(name.as_deref(), Some("test-dispatch"));
        }
    }

    #[test]
    fn test_thread_scheduler_drains_after_drop() {
        let scheduler = ThreadScheduler::new("test-drop");
        let (tx, rx) = channel();
        scheduler.defer(Box::new(move || tx.send("ran").unwrap()));
        drop(scheduler);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("ran"));
    }

    #[test]
    fn test_thread_scheduler_survives_panicking_task() {
        let scheduler = ThreadScheduler::new("test-panic");
        let (tx, rx) = channel();
        scheduler.defer(Box::new(|| panic!("task bug")));
        scheduler.defer(Box::new(move || tx.send("still running").unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("still running"));
    }
}
