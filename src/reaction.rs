use crate::future::{warn_if_refused, Future};
use crate::thenable::Resolution;
use std::panic::{self, AssertUnwindSafe};

/// What a reaction callback hands back.
///
/// `Ok(Some(_))` resolves the child with the given resolution, `Ok(None)`
/// means the callback produced nothing, and `Err(_)` rejects the child.
///
/// Handing back the child itself, directly as `Resolution::Future` or through
/// a thenable's `Resolver`, fails with [`Error::SelfResolution`]. Nobody is
/// left to receive that error and `E` cannot be built from it, so it is logged
/// and the child stays pending until settled through another handle.
///
/// [`Error::SelfResolution`]: crate::Error::SelfResolution
pub type Reply<T, E> = Result<Option<Resolution<T, E>>, E>;

/// Called with the value once the parent is fulfilled.
pub type OnFulfilled<T, E> = Box<dyn FnOnce(T) -> Reply<T, E> + Send>;

/// Called with the reason once the parent is rejected.
pub type OnRejected<T, E> = Box<dyn FnOnce(E) -> Reply<T, E> + Send>;

/// A queued `then` registration.
pub(crate) struct Reaction<T, E> {
    on_fulfilled: Option<OnFulfilled<T, E>>,
    on_rejected: Option<OnRejected<T, E>>,
    child: Future<T, E>,
}

impl<T, E> Reaction<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(
        on_fulfilled: Option<OnFulfilled<T, E>>,
        on_rejected: Option<OnRejected<T, E>>,
        child: Future<T, E>,
    ) -> Self {
        Self {
            on_fulfilled,
            on_rejected,
            child,
        }
    }

    /// Feeds the parent's outcome through the callbacks into the child.
    ///
    /// A panic anywhere in here, from a callback or from a thenable the
    /// callback handed back, is contained: the child is left as it is and the
    /// rest of the queue is still dispatched.
    pub(crate) fn run(self, outcome: Result<T, E>) {
        if panic::catch_unwind(AssertUnwindSafe(move || self.settle_child(outcome))).is_err() {
            tracing::error!("reaction panicked, its child stays pending");
        }
    }

    fn settle_child(self, outcome: Result<T, E>) {
        let Reaction {
            on_fulfilled,
            on_rejected,
            child,
        } = self;
        let settled = match outcome {
            Ok(value) => match on_fulfilled {
                Some(callback) => match callback(value.clone()) {
                    Ok(Some(resolution)) => child.resolve_with(resolution),
                    Ok(None) => child.resolve(value),
                    Err(reason) => child.reject(reason),
                },
                None => child.resolve(value),
            },
            Err(reason) => match on_rejected {
                Some(callback) => match callback(reason.clone()) {
                    Ok(Some(resolution)) => child.resolve_with(resolution),
                    // Recovery needs an explicit reply.
                    Ok(None) => child.reject(reason),
                    Err(thrown) => child.reject(thrown),
                },
                None => child.reject(reason),
            },
        };
        warn_if_refused(settled);
    }
}

#[cfg(test)]
mod tests {
    use super::{OnFulfilled, OnRejected, Reaction};
    use crate::{thenable, Future, ManualScheduler, Resolution, Status};
    use std::sync::{Arc, Mutex};

    fn child() -> Future<i32, String> {
        Future::with_scheduler(Arc::new(ManualScheduler::new()))
    }

    fn fulfilled(reply: Option<i32>) -> Option<OnFulfilled<i32, String>> {
        Some(Box::new(move |_| Ok(reply.map(Resolution::Value))))
    }

    fn rejected(reply: Option<i32>) -> Option<OnRejected<i32, String>> {
        Some(Box::new(move |_| Ok(reply.map(Resolution::Value))))
    }

    #[test]
    fn test_fulfilment_reply_and_pass_through() {
        let c = child();
        Reaction::new(fulfilled(Some(2)), None, c.clone()).run(Ok(1));
        assert_eq!(c.value(), Some(2));

        let c = child();
        Reaction::new(fulfilled(None), None, c.clone()).run(Ok(1));
        assert_eq!(c.value(), Some(1));

        let c = child();
        Reaction::new(None, None, c.clone()).run(Ok(1));
        assert_eq!(c.value(), Some(1));
    }

    #[test]
    fn test_rejection_needs_explicit_recovery() {
        let c = child();
        Reaction::new(None, rejected(Some(7)), c.clone()).run(Err("e".into()));
        assert_eq!(c.value(), Some(7));

        let c = child();
        Reaction::new(None, rejected(None), c.clone()).run(Err("e".into()));
        assert_eq!(c.reason(), Some("e".to_string()));

        let c = child();
        Reaction::new(fulfilled(Some(1)), None, c.clone()).run(Err("e".into()));
        assert_eq!(c.reason(), Some("e".to_string()));
    }

    #[test]
    fn test_failing_callbacks_reject_child() {
        let c = child();
        let on_fulfilled: OnFulfilled<i32, String> = Box::new(|_| Err("boom".into()));
        Reaction::new(Some(on_fulfilled), None, c.clone()).run(Ok(1));
        assert_eq!(c.reason(), Some("boom".to_string()));

        let c = child();
        let on_rejected: OnRejected<i32, String> = Box::new(|_| Err("again".into()));
        Reaction::new(None, Some(on_rejected), c.clone()).run(Err("e".into()));
        assert_eq!(c.reason(), Some("again".to_string()));
    }

    #[test]
    fn test_panicking_callback_leaves_child_pending() {
        let c = child();
        let on_fulfilled: OnFulfilled<i32, String> = Box::new(|_| panic!("callback bug"));
        Reaction::new(Some(on_fulfilled), None, c.clone()).run(Ok(1));
        assert_eq!(c.state(), Status::Pending);
    }

    #[test]
    fn test_child_settled_elsewhere_is_left_alone() {
        let c = child();
        c.resolve(100).unwrap();
        Reaction::new(None, None, c.clone()).run(Ok(1));
        assert_eq!(c.value(), Some(100));
    }

    #[test]
    fn test_panicking_thenable_reply_is_contained() {
        let c = child();
        let on_fulfilled: OnFulfilled<i32, String> = Box::new(|_| {
            Ok(Some(Resolution::Thenable(Box::new(thenable::<i32, String, _>(|_, _| {
                panic!("thenable bug")
            })))))
        });
        Reaction::new(Some(on_fulfilled), None, c.clone()).run(Ok(1));
        assert_eq!(c.state(), Status::Pending);
    }

    #[test]
    fn test_replying_with_own_child_leaves_it_pending() {
        let c = child();
        let slot: Arc<Mutex<Option<Future<i32, String>>>> = Arc::new(Mutex::new(Some(c.clone())));
        let on_fulfilled: OnFulfilled<i32, String> = Box::new(move |_| {
            let own = slot.lock().unwrap().take().unwrap();
            Ok(Some(Resolution::Future(own)))
        });
        Reaction::new(Some(on_fulfilled), None, c.clone()).run(Ok(1));
        assert_eq!(c.state(), Status::Pending);
        assert_eq!(c.resolve(2), Ok(()));
    }
}
