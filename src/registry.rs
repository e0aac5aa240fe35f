//! Opt-in registration of a future constructor under a well-known name.
//!
//! Nothing here is global: the caller owns the [`Namespace`], installs a
//! binding, and keeps the [`NoConflict`] token to put the previous binding
//! back later.
use crate::future::Future;
use crate::scheduler::{default_scheduler, Scheduler};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The name [`register`] binds a [`Factory`] to.
pub const GLOBAL_NAME: &str = "Future";

/// A caller-owned map of names to bindings.
pub struct Namespace<V> {
    bindings: HashMap<String, V>,
}

impl<V> Namespace<V> {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binds `name`, remembering whatever it was bound to before.
    pub fn install(&mut self, name: impl Into<String>, binding: V) -> NoConflict<V> {
        let name = name.into();
        let previous = self.bindings.insert(name.clone(), binding);
        NoConflict { name, previous }
    }
}

impl<V> Default for Namespace<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Namespace<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bindings.keys()).finish()
    }
}

/// Undo token for [`Namespace::install`].
#[must_use = "dropping the token makes the previous binding unrecoverable"]
pub struct NoConflict<V> {
    name: String,
    previous: Option<V>,
}

impl<V> NoConflict<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Puts the previous binding back (or unbinds the name if there was none)
    /// and returns the binding that was in place.
    pub fn restore(self, namespace: &mut Namespace<V>) -> Option<V> {
        match self.previous {
            Some(previous) => namespace.bindings.insert(self.name, previous),
            None => namespace.bindings.remove(&self.name),
        }
    }
}

/// Creates futures that share one scheduler.
pub struct Factory<T, E> {
    scheduler: Arc<dyn Scheduler>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Factory<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            _marker: PhantomData,
        }
    }

    pub fn create(&self) -> Future<T, E> {
        Future::with_scheduler(self.scheduler.clone())
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }
}

impl<T, E> Clone for Factory<T, E> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, E> Default for Factory<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(default_scheduler())
    }
}

impl<T, E> fmt::Debug for Factory<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// Binds `factory` to [`GLOBAL_NAME`] in `namespace`.
///
/// # Examples
///
/// ```
/// use future_out::registry::{register, GLOBAL_NAME};
/// use future_out::{Factory, ManualScheduler, Namespace};
/// use std::sync::Arc;
///
/// let mut ns = Namespace::new();
/// let token = register(&mut ns, Factory::<i32, String>::new(Arc::new(ManualScheduler::new())));
/// let p = ns.get(GLOBAL_NAME).unwrap().create();
/// assert!(p.is_pending());
/// token.restore(&mut ns);
/// assert!(!ns.contains(GLOBAL_NAME));
/// ```
pub fn register<T, E>(
    namespace: &mut Namespace<Factory<T, E>>,
    factory: Factory<T, E>,
) -> NoConflict<Factory<T, E>>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    tracing::debug!(name = GLOBAL_NAME, "registering future factory");
    namespace.install(GLOBAL_NAME, factory)
}

#[cfg(test)]
mod tests {
    use super::{register, Factory, Namespace, GLOBAL_NAME};
    use crate::{Future, ManualScheduler};
    use std::sync::Arc;

    #[test]
    fn test_restore_puts_previous_binding_back() {
        let mut ns = Namespace::new();
        let _first = ns.install("Future", 1);
        let second = ns.install("Future", 2);
        assert_eq!(ns.get("Future"), Some(&2));
        assert_eq!(second.restore(&mut ns), Some(2));
        assert_eq!(ns.get("Future"), Some(&1));
    }

    #[test]
    fn test_restore_without_previous_unbinds() {
        let mut ns = Namespace::new();
        let token = ns.install("x", "bound");
        assert_eq!(token.name(), "x");
        assert_eq!(token.restore(&mut ns), Some("bound"));
        assert!(!ns.contains("x"));
    }

    #[test]
    fn test_registered_factory_shares_scheduler() {
        let scheduler = ManualScheduler::new();
        let mut ns = Namespace::new();
        let _token = register(&mut ns, Factory::<i32, String>::new(Arc::new(scheduler.clone())));
        let factory = ns.get(GLOBAL_NAME).unwrap();
        let (a, b): (Future<i32, String>, _) = (factory.create(), factory.create());
        assert!(!Future::ptr_eq(&a, &b));
        a.resolve(1).unwrap();
        b.reject("e".into()).unwrap();
        assert_eq!(scheduler.pending(), 2);
    }
}
