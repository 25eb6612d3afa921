//! Watcher Implementation
//!
//! A Watcher is a ready-made subscriber: a computation that re-runs when
//! something it read changes.
//!
//! # How Watchers Work
//!
//! 1. An eager watcher runs its function immediately, inside a reactive
//!    context, to establish its initial dependencies. A lazy watcher starts
//!    dirty and runs on the first [`Watcher::evaluate`].
//!
//! 2. When any dependency set it subscribed to notifies, an eager watcher
//!    re-runs synchronously; a lazy one only marks itself dirty.
//!
//! 3. Every run collects a fresh dependency list. Dependency sets that were
//!    read by the previous run but not by this one drop the watcher, so a
//!    branch that is no longer taken stops triggering re-runs.
//!
//! A notification that arrives while the watcher is already running (its
//! own function wrote to something it reads) does not re-enter; the watcher
//! is marked dirty instead.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::{Subscriber, SubscriberId};
use crate::change::Change;
use crate::error::BoxError;

struct WatcherInner {
    id: SubscriberId,
    this: Weak<WatcherInner>,
    run: Box<dyn Fn() + Send + Sync>,
    lazy: bool,
    dirty: AtomicBool,
    running: AtomicBool,
    active: AtomicBool,
    /// Dependencies of the last completed run.
    deps: Mutex<Vec<Dep>>,
    /// Dependencies collected by the run in progress.
    new_deps: Mutex<Vec<Dep>>,
    run_count: AtomicUsize,
    invalidation_count: AtomicUsize,
}

/// A computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use vigil_core::{observe, reactive::Watcher, Value};
/// use serde_json::json;
///
/// let state = Value::from(json!({ "count": 1 }));
/// observe(&state, false, false);
///
/// let reader = state.clone();
/// let watcher = Watcher::new(move || {
///     reader.get("count");
/// });
///
/// state.as_record().unwrap().set("count", 2).unwrap();
/// assert_eq!(watcher.run_count(), 2);
/// ```
///
/// Cloning a `Watcher` yields another handle to the same computation.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let watcher = Self::build(run, false);
        watcher.inner.execute();
        watcher
    }

    /// Create a watcher that only runs on [`Watcher::evaluate`].
    pub fn lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(run, true)
    }

    fn build<F>(run: F, lazy: bool) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| WatcherInner {
            id: SubscriberId::new(),
            this: this.clone(),
            run: Box::new(run),
            lazy,
            dirty: AtomicBool::new(lazy),
            running: AtomicBool::new(false),
            active: AtomicBool::new(true),
            deps: Mutex::new(Vec::new()),
            new_deps: Mutex::new(Vec::new()),
            run_count: AtomicUsize::new(0),
            invalidation_count: AtomicUsize::new(0),
        });
        Self { inner }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the function now if the watcher is dirty.
    pub fn evaluate(&self) {
        if self.inner.dirty.load(Ordering::SeqCst) {
            self.inner.execute();
        }
    }

    /// Run the function now, regardless of dirtiness.
    pub fn run(&self) {
        self.inner.execute();
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    /// Number of times the function has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of notifications received.
    pub fn invalidation_count(&self) -> usize {
        self.inner.invalidation_count.load(Ordering::SeqCst)
    }

    /// Number of dependency sets read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// Unsubscribe from every dependency set and stop reacting.
    pub fn teardown(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let deps = std::mem::take(&mut *self.inner.deps.lock());
        for dep in &deps {
            dep.remove_sub(self.inner.id);
        }
        debug!(watcher = self.inner.id.raw(), deps = deps.len(), "watcher torn down");
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// This watcher as a subscriber handle, e.g. for
    /// [`with_active_subscriber`](super::with_active_subscriber).
    pub fn as_subscriber(&self) -> Arc<dyn Subscriber> {
        self.inner.clone()
    }
}

impl WatcherInner {
    fn execute(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.dirty.store(true, Ordering::SeqCst);
            return;
        }
        let _running = RunningGuard(&self.running);
        let Some(this) = self.this.upgrade() else {
            return;
        };

        self.dirty.store(false, Ordering::SeqCst);
        // Leftovers from a run that panicked.
        self.new_deps.lock().clear();
        {
            let _ctx = ReactiveContext::enter(this);
            (self.run)();
        }
        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.cleanup_deps();
    }

    /// Swap in the dependencies collected by the last run and drop the
    /// subscriptions that run no longer needs.
    fn cleanup_deps(&self) {
        let new_deps = std::mem::take(&mut *self.new_deps.lock());
        let old_deps = std::mem::replace(&mut *self.deps.lock(), new_deps);

        let current = self.deps.lock();
        let mut dropped = 0;
        for dep in &old_deps {
            if !current.iter().any(|d| d == dep) {
                dep.remove_sub(self.id);
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(watcher = self.id.raw(), dropped, "stale dependencies removed");
        }
    }
}

/// Clears the running flag when dropped, even if the run panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dependency(&self, dep: &Dep) {
        let mut new_deps = self.new_deps.lock();
        if !new_deps.iter().any(|d| d == dep) {
            new_deps.push(dep.clone());
        }
    }

    fn invalidate(&self, _change: &Change) -> Result<(), BoxError> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.invalidation_count.fetch_add(1, Ordering::SeqCst);
        if self.lazy {
            self.dirty.store(true, Ordering::SeqCst);
        } else {
            self.execute();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("lazy", &self.inner.lazy)
            .field("dirty", &self.is_dirty())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eager_watcher_runs_on_creation() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || dep_clone.depend());

        assert_eq!(watcher.run_count(), 1);
        assert_eq!(watcher.dependency_count(), 1);
        assert!(dep.has_sub(watcher.id()));
    }

    #[test]
    fn notify_reruns_eager_watcher() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || dep_clone.depend());

        dep.notify(&Change::delete("x")).unwrap();
        assert_eq!(watcher.run_count(), 2);
        assert_eq!(watcher.invalidation_count(), 1);
    }

    #[test]
    fn lazy_watcher_marks_dirty() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::lazy(move || dep_clone.depend());

        assert!(watcher.is_dirty());
        assert_eq!(watcher.run_count(), 0);

        watcher.evaluate();
        watcher.evaluate();
        assert_eq!(watcher.run_count(), 1);

        dep.notify(&Change::delete("x")).unwrap();
        assert!(watcher.is_dirty());
        assert_eq!(watcher.run_count(), 1);

        watcher.evaluate();
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let flag = Arc::new(AtomicBool::new(true));
        let a = Dep::new();
        let b = Dep::new();

        let (flag_clone, a_clone, b_clone) = (flag.clone(), a.clone(), b.clone());
        let watcher = Watcher::new(move || {
            if flag_clone.load(Ordering::SeqCst) {
                a_clone.depend();
            } else {
                b_clone.depend();
            }
        });
        assert!(a.has_sub(watcher.id()));

        flag.store(false, Ordering::SeqCst);
        watcher.run();
        assert!(!a.has_sub(watcher.id()));
        assert!(b.has_sub(watcher.id()));
        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn self_notification_does_not_reenter() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || {
            dep_clone.depend();
            let _ = dep_clone.notify(&Change::delete("x"));
        });

        assert_eq!(watcher.run_count(), 1);
        assert!(watcher.is_dirty());
    }

    #[test]
    fn panicking_run_does_not_wedge_the_watcher() {
        let fail = Arc::new(AtomicBool::new(false));
        let dep = Dep::new();

        let (fail_clone, dep_clone) = (fail.clone(), dep.clone());
        let watcher = Watcher::new(move || {
            dep_clone.depend();
            if fail_clone.load(Ordering::SeqCst) {
                panic!("render failed");
            }
        });

        fail.store(true, Ordering::SeqCst);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| watcher.run()));
        assert!(result.is_err());
        assert_eq!(watcher.run_count(), 1);

        fail.store(false, Ordering::SeqCst);
        dep.notify(&Change::delete("x")).unwrap();
        assert_eq!(watcher.run_count(), 2);
        assert!(!watcher.is_dirty());
        assert!(dep.has_sub(watcher.id()));
    }

    #[test]
    fn teardown_unsubscribes() {
        let dep = Dep::new();
        let dep_clone = dep.clone();
        let watcher = Watcher::new(move || dep_clone.depend());

        watcher.teardown();
        assert!(!watcher.is_active());
        assert!(!dep.has_sub(watcher.id()));

        watcher.run();
        assert_eq!(watcher.run_count(), 1);
    }
}
