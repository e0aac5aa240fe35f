use crate::future::Future;
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// Waits for a [`Future`] to settle. Any number of these may wait on the same
/// future; each resolves to a clone of the outcome.
///
/// Waiters are woken the moment the future settles, independently of when its
/// reactions are dispatched.
///
/// # Examples
///
/// ```
/// use future_out::{Future, ManualScheduler};
/// use futures::executor::block_on;
/// use std::sync::Arc;
/// use std::thread;
///
/// let p = Future::<String, String>::with_scheduler(Arc::new(ManualScheduler::new()));
/// let waiter = p.settled();
/// let task = thread::spawn(move || block_on(waiter));
/// p.reject("💥".into()).unwrap();
/// assert_eq!(task.join().expect("The task thread has panicked"), Err("💥".to_string()));
/// ```
#[derive(Debug)]
pub struct Settled<T, E> {
    future: Future<T, E>,
}

impl<T, E> Settled<T, E> {
    pub(crate) fn new(future: Future<T, E>) -> Self {
        Self { future }
    }
}

impl<T, E> std::future::Future for Settled<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.poll_settled(cx.waker())
    }
}
