//! A deferred value that settles exactly once, with `then` chaining.
//!
//! A [`Future`] starts out pending and is settled by calling
//! [`resolve`](Future::resolve) or [`reject`](Future::reject). Reactions
//! registered with [`then`](Future::then) run after settlement, never on the
//! stack of the call that settled it: they are handed to a [`Scheduler`].
//!
//! # Examples
//!
//! ```
//! use future_out::{Future, ManualScheduler, Resolution};
//! use std::sync::Arc;
//!
//! let scheduler = ManualScheduler::new();
//! let p = Future::<i32, String>::with_scheduler(Arc::new(scheduler.clone()));
//! let q = p
//!     .and_then(|x| Ok(Some(Resolution::Value(x + 1))))
//!     .and_then(|y| Ok(Some(Resolution::Value(y * 2))));
//! p.resolve(20).unwrap();
//! scheduler.run_until_idle();
//! assert_eq!(q.value(), Some(42));
//! ```
pub mod channel;
pub mod future;
pub mod reaction;
pub mod registry;
pub mod scheduler;
pub mod settled;
pub mod thenable;

pub use channel::ThreadScheduler;
pub use future::{Future, Status};
pub use reaction::{OnFulfilled, OnRejected, Reply};
pub use registry::{register, Factory, Namespace, NoConflict, GLOBAL_NAME};
pub use scheduler::{default_scheduler, ManualScheduler, Scheduler, Task};
pub use settled::Settled;
pub use thenable::{thenable, Rejecter, Resolution, Resolver, ThenMember, ThenMethod, Thenable};

use std::fmt;
use thiserror::Error;

/// The settlement operation that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Resolve,
    Reject,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Resolve => f.write_str("resolve"),
            Operation::Reject => f.write_str("reject"),
        }
    }
}

/// Contract violations reported synchronously by `resolve` and `reject`.
///
/// Failures of callbacks and thenables are not errors of this kind; they turn
/// into rejections and travel down the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("future has already been {state}, cannot {op}")]
    AlreadySettled { state: Status, op: Operation },
    #[error("cannot resolve a future with itself")]
    SelfResolution,
}
