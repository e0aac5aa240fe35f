//! Interop with foreign future-like values.
//!
//! Anything that exposes a callable `then` member can be handed to
//! [`Future::resolve_thenable`](crate::Future::resolve_thenable). The foreign
//! `then` receives a [`Resolver`] and a [`Rejecter`]; whichever is called
//! first wins and every later call of either is ignored.
use crate::future::{warn_if_refused, Future};
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// What a [`Future`] can be resolved with.
pub enum Resolution<T, E> {
    /// A plain value; the future is fulfilled with it.
    Value(T),
    /// A future of this crate; its eventual state is adopted.
    Future(Future<T, E>),
    /// A foreign future-like value; its `then` member is called.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> From<Future<T, E>> for Resolution<T, E> {
    fn from(future: Future<T, E>) -> Self {
        Resolution::Future(future)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Future(_) => f.write_str("Future(..)"),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// The `then` member of a thenable, ready to be called once.
pub type ThenMethod<T, E> =
    Box<dyn FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E> + Send>;

/// Result of looking up a thenable's `then` member.
pub enum ThenMember<T, E> {
    Callable(ThenMethod<T, E>),
    /// No callable `then`: the value is an ordinary value after all.
    Absent(T),
}

/// A value that may expose a callable `then` member.
///
/// Looking the member up may itself fail; the future being resolved is then
/// rejected with that error.
pub trait Thenable<T, E>: Send {
    fn then_member(self: Box<Self>) -> Result<ThenMember<T, E>, E>;
}

struct FnThenable<F>(F);

impl<T, E, F> Thenable<T, E> for FnThenable<F>
where
    T: 'static,
    E: 'static,
    F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E> + Send + 'static,
{
    fn then_member(self: Box<Self>) -> Result<ThenMember<T, E>, E> {
        Ok(ThenMember::Callable(Box::new(self.0)))
    }
}

/// Wraps a closure as a thenable whose `then` member is always callable.
///
/// # Examples
///
/// ```
/// use future_out::{thenable, Future, ManualScheduler};
/// use std::sync::Arc;
///
/// let scheduler = ManualScheduler::new();
/// let p = Future::<i32, String>::with_scheduler(Arc::new(scheduler));
/// p.resolve_thenable(thenable(|resolve, _reject| {
///     resolve.resolve_value(5);
///     Ok(())
/// }))
/// .unwrap();
/// assert_eq!(p.value(), Some(5));
/// ```
pub fn thenable<T, E, F>(then: F) -> impl Thenable<T, E>
where
    T: 'static,
    E: 'static,
    F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E> + Send + 'static,
{
    FnThenable(then)
}

/// The resolve capability handed to a thenable's `then`.
pub struct Resolver<T, E> {
    target: Future<T, E>,
    latch: Arc<AtomicBool>,
}

/// The reject capability handed to a thenable's `then`.
pub struct Rejecter<T, E> {
    target: Future<T, E>,
    latch: Arc<AtomicBool>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            latch: self.latch.clone(),
        }
    }
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            latch: self.latch.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Resolves the target, unless either capability already fired.
    pub fn resolve(&self, value: Resolution<T, E>) {
        if !self.latch.swap(true, Ordering::SeqCst) {
            warn_if_refused(self.target.resolve_with(value));
        }
    }

    pub fn resolve_value(&self, value: T) {
        self.resolve(Resolution::Value(value))
    }
}

impl<T, E> Rejecter<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Rejects the target, unless either capability already fired.
    pub fn reject(&self, reason: E) {
        if !self.latch.swap(true, Ordering::SeqCst) {
            warn_if_refused(self.target.reject(reason));
        }
    }
}

/// Runs the thenable branch of the resolution procedure for `target`.
///
/// `target` is known to be pending on entry.
pub(crate) fn absorb<T, E>(
    target: &Future<T, E>,
    thenable: Box<dyn Thenable<T, E>>,
) -> Result<(), crate::Error>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let method = match thenable.then_member() {
        Ok(ThenMember::Callable(method)) => method,
        Ok(ThenMember::Absent(value)) => return target.resolve(value),
        Err(reason) => {
            tracing::debug!("reading `then` member failed, rejecting");
            return target.reject(reason);
        }
    };
    let latch = Arc::new(AtomicBool::new(false));
    let resolver = Resolver {
        target: target.clone(),
        latch: latch.clone(),
    };
    let rejecter = Rejecter {
        target: target.clone(),
        latch: latch.clone(),
    };
    if let Err(reason) = method(resolver, rejecter) {
        if !latch.swap(true, Ordering::SeqCst) {
            tracing::debug!("`then` member failed before settling, rejecting");
            warn_if_refused(target.reject(reason));
        }
    }
    Ok(())
}
