//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on tracked values.
//! The engine never constructs subscribers itself; it only stores whatever
//! the [`ReactiveContext`](super::ReactiveContext) held at read time and calls
//! back into it when a dependency changes.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::dep::{Dep, DepId};
use crate::change::Change;
use crate::error::BoxError;

/// Unique identifier for a subscriber.
///
/// Dependency sets use this ID to avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer of tracked values.
///
/// `add_dependency` is called every time the subscriber reads a tracked unit
/// while active, so it can later drop dependencies it no longer touches.
/// `invalidate` is what a dependency set calls when the unit changes.
pub trait Subscriber: Send + Sync {
    /// The subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Record that this subscriber read the given dependency set.
    fn add_dependency(&self, dep: &Dep);

    /// Called when a dependency changed.
    ///
    /// An error does not stop the remaining subscribers of the same notify
    /// pass from running; it is collected and returned to the writer.
    fn invalidate(&self, change: &Change) -> Result<(), BoxError>;
}

/// A subscriber backed by a notification callback.
///
/// Useful for hosts that only need a hook and do their own scheduling.
pub struct Notifier {
    id: SubscriberId,
    /// The callback to invoke when dependencies change.
    notify: Box<dyn Fn(&Change) -> Result<(), BoxError> + Send + Sync>,
    /// Dependency sets touched while this notifier was active.
    dependencies: Mutex<Vec<DepId>>,
}

impl Notifier {
    /// Create a new notifier with the given callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        Self::fallible(move |change| {
            notify(change);
            Ok(())
        })
    }

    /// Create a notifier whose callback may fail.
    pub fn fallible<F>(notify: F) -> Self
    where
        F: Fn(&Change) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
            dependencies: Mutex::new(Vec::new()),
        }
    }

    /// Number of distinct dependency sets this notifier has read.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }
}

impl Subscriber for Notifier {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dependency(&self, dep: &Dep) {
        let mut deps = self.dependencies.lock();
        if !deps.contains(&dep.id()) {
            deps.push(dep.id());
        }
    }

    fn invalidate(&self, change: &Change) -> Result<(), BoxError> {
        (self.notify)(change)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("id", &self.id)
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notifier_invalidate_calls_callback() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let notifier = Notifier::new(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        notifier.invalidate(&Change::set("count", None, None)).unwrap();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn notifier_records_each_dependency_once() {
        let notifier = Notifier::new(|_| {});
        let dep = Dep::new();

        notifier.add_dependency(&dep);
        notifier.add_dependency(&dep);
        notifier.add_dependency(&Dep::new());

        assert_eq!(notifier.dependency_count(), 2);
    }
}
