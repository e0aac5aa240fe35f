use crate::reaction::{OnFulfilled, OnRejected, Reaction, Reply};
use crate::scheduler::{default_scheduler, Scheduler};
use crate::settled::Settled;
use crate::thenable::{self, Resolution, Thenable};
use crate::{Error, Operation};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Poll, Waker};

/// Where a [`Future`] stands, without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => f.write_str("pending"),
            Status::Fulfilled => f.write_str("fulfilled"),
            Status::Rejected => f.write_str("rejected"),
        }
    }
}

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

struct Inner<T, E> {
    state: State<T, E>,
    reactions: VecDeque<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

/// A value or failure that becomes available later, exactly once.
///
/// `Future` is a handle: clones refer to the same entity. It is settled with
/// [`resolve`](Self::resolve) (or its siblings) or [`reject`](Self::reject);
/// the new state is visible as soon as the call returns. Reactions added with
/// [`then`](Self::then) are always run later by the future's [`Scheduler`],
/// in the order they were added.
///
/// # Examples
///
/// ```
/// use future_out::{Future, ManualScheduler, Resolution};
/// use std::sync::Arc;
///
/// let scheduler = ManualScheduler::new();
/// let p = Future::<String, String>::with_scheduler(Arc::new(scheduler.clone()));
/// let recovered = p
///     .or_else(|_| Ok(Some(Resolution::Value("recovered".to_string()))));
/// p.reject("x".into()).unwrap();
/// assert!(p.is_rejected());
/// assert!(recovered.is_pending());
/// scheduler.run_until_idle();
/// assert_eq!(recovered.value().as_deref(), Some("recovered"));
/// ```
pub struct Future<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A pending future dispatching on the [default scheduler](default_scheduler).
    pub fn new() -> Self {
        Self::with_scheduler(default_scheduler())
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                reactions: VecDeque::new(),
                wakers: vec![],
            })),
            scheduler,
        }
    }

    /// An already fulfilled future.
    pub fn fulfilled(scheduler: Arc<dyn Scheduler>, value: T) -> Self {
        let future = Self::with_scheduler(scheduler);
        future.lock().state = State::Fulfilled(value);
        future
    }

    /// An already rejected future.
    pub fn rejected(scheduler: Arc<dyn Scheduler>, reason: E) -> Self {
        let future = Self::with_scheduler(scheduler);
        future.lock().state = State::Rejected(reason);
        future
    }

    /// Registers a reaction and returns the future it feeds.
    ///
    /// The returned child is always pending, even when `self` is already
    /// settled; it settles once the reaction has been dispatched.
    pub fn then(
        &self,
        on_fulfilled: Option<OnFulfilled<T, E>>,
        on_rejected: Option<OnRejected<T, E>>,
    ) -> Self {
        let child = Self::with_scheduler(self.scheduler.clone());
        let settled = {
            let mut inner = self.lock();
            inner
                .reactions
                .push_back(Reaction::new(on_fulfilled, on_rejected, child.clone()));
            !matches!(inner.state, State::Pending)
        };
        if settled {
            self.schedule_dispatch();
        }
        child
    }

    /// `then` with only a fulfilment callback.
    pub fn and_then<F>(&self, on_fulfilled: F) -> Self
    where
        F: FnOnce(T) -> Reply<T, E> + Send + 'static,
    {
        self.then(Some(Box::new(on_fulfilled)), None)
    }

    /// `then` with only a rejection callback.
    pub fn or_else<R>(&self, on_rejected: R) -> Self
    where
        R: FnOnce(E) -> Reply<T, E> + Send + 'static,
    {
        self.then(None, Some(Box::new(on_rejected)))
    }

    pub fn then_both<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Self
    where
        F: FnOnce(T) -> Reply<T, E> + Send + 'static,
        R: FnOnce(E) -> Reply<T, E> + Send + 'static,
    {
        self.then(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    /// Fulfils the future with a plain value.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.resolve_with(Resolution::Value(value))
    }

    /// Resolves the future with another future of this crate, adopting its
    /// eventual state.
    pub fn adopt(&self, other: &Future<T, E>) -> Result<(), Error> {
        self.resolve_with(Resolution::Future(other.clone()))
    }

    /// Resolves the future with a foreign future-like value.
    pub fn resolve_thenable<Th>(&self, thenable: Th) -> Result<(), Error>
    where
        Th: Thenable<T, E> + 'static,
    {
        self.resolve_with(Resolution::Thenable(Box::new(thenable)))
    }

    /// The resolution procedure.
    ///
    /// Fails with [`Error::AlreadySettled`] unless the future is pending, and
    /// with [`Error::SelfResolution`] when asked to adopt itself. A future that
    /// adopts another future, or waits on a thenable, stays pending until that
    /// one settles.
    pub fn resolve_with(&self, resolution: Resolution<T, E>) -> Result<(), Error> {
        self.ensure_pending(Operation::Resolve)?;
        match resolution {
            Resolution::Value(value) => self.settle(State::Fulfilled(value), Operation::Resolve),
            Resolution::Future(other) => {
                if Self::ptr_eq(self, &other) {
                    return Err(Error::SelfResolution);
                }
                tracing::debug!(adopted = %other.state(), "adopting the state of another future");
                let (on_value, on_reason) = (self.clone(), self.clone());
                other.then(
                    Some(Box::new(move |value| {
                        warn_if_refused(on_value.resolve(value));
                        Ok(None)
                    })),
                    Some(Box::new(move |reason| {
                        warn_if_refused(on_reason.reject(reason));
                        Ok(None)
                    })),
                );
                Ok(())
            }
            Resolution::Thenable(foreign) => thenable::absorb(self, foreign),
        }
    }

    /// Rejects the future. The reason is stored as given.
    pub fn reject(&self, reason: E) -> Result<(), Error> {
        self.settle(State::Rejected(reason), Operation::Reject)
    }

    /// Awaits settlement: `Ok(value)` or `Err(reason)`.
    pub fn settled(&self) -> Settled<T, E> {
        Settled::new(self.clone())
    }

    pub fn state(&self) -> Status {
        self.lock().state.status()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == Status::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == Status::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == Status::Rejected
    }

    /// The value, if fulfilled.
    pub fn value(&self) -> Option<T> {
        match &self.lock().state {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The reason, if rejected.
    pub fn reason(&self) -> Option<E> {
        match &self.lock().state {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The settled value as a `Result`, if settled.
    pub fn result(&self) -> Option<Result<T, E>> {
        self.lock().outcome()
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }

    pub(crate) fn poll_settled(&self, waker: &Waker) -> Poll<Result<T, E>> {
        let mut inner = self.lock();
        match inner.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                if !inner.wakers.iter().any(|w| w.will_wake(waker)) {
                    inner.wakers.push(waker.clone());
                }
                Poll::Pending
            }
        }
    }

    fn ensure_pending(&self, op: Operation) -> Result<(), Error> {
        match self.state() {
            Status::Pending => Ok(()),
            state => Err(Error::AlreadySettled { state, op }),
        }
    }

    fn settle(&self, next: State<T, E>, op: Operation) -> Result<(), Error> {
        let status = next.status();
        let wakers = {
            let mut inner = self.lock();
            if let state @ (Status::Fulfilled | Status::Rejected) = inner.state.status() {
                return Err(Error::AlreadySettled { state, op });
            }
            inner.state = next;
            std::mem::take(&mut inner.wakers)
        };
        tracing::debug!(%status, "future settled");
        for waker in wakers {
            waker.wake()
        }
        self.schedule_dispatch();
        Ok(())
    }

    fn schedule_dispatch(&self) {
        let this = self.clone();
        self.scheduler.defer(Box::new(move || this.dispatch()));
    }

    /// Drains the reaction queue as it stands now, oldest first.
    fn dispatch(&self) {
        let (outcome, reactions) = {
            let mut inner = self.lock();
            let Some(outcome) = inner.outcome() else {
                return;
            };
            (outcome, std::mem::take(&mut inner.reactions))
        };
        if reactions.is_empty() {
            return;
        }
        tracing::trace!(reactions = reactions.len(), "dispatching reactions");
        for reaction in reactions {
            reaction.run(outcome.clone());
        }
    }
}

impl<T, E> Future<T, E> {
    /// Whether both handles refer to the same future.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone, E: Clone> Inner<T, E> {
    fn outcome(&self) -> Option<Result<T, E>> {
        match &self.state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

impl<T, E> Default for Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future({})", self.lock().state.status())
    }
}

/// Logs a settlement that nobody is around to be told about.
pub(crate) fn warn_if_refused(result: Result<(), Error>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "settlement dropped");
    }
}
