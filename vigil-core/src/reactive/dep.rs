//! Dependency Sets
//!
//! A [`Dep`] is the subscriber registry for one trackable unit: a single
//! record field, or a container as a whole.
//!
//! # How Dependency Sets Work
//!
//! 1. When a tracked unit is read within a reactive context, its `Dep`
//!    subscribes the active subscriber (once) and tells the subscriber it
//!    now depends on this set.
//!
//! 2. When the unit changes, `notify` invokes every subscriber in the order
//!    they first subscribed.
//!
//! # Memory Layout
//!
//! Subscribers are held weakly. A subscriber that has been dropped simply
//! disappears from the set on the next notify; explicit removal is left to
//! the subscriber (see [`Dep::remove_sub`]).

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::change::Change;
use crate::error::{NotifyError, SubscriberFailure};

/// Counter for generating unique dependency set IDs.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        Self(DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type SubscriberList = SmallVec<[(SubscriberId, Weak<dyn Subscriber>); 4]>;

struct DepInner {
    id: DepId,
    /// Inert sets never subscribe nor notify. Used for mock wrappers.
    inert: bool,
    subscribers: Mutex<SubscriberList>,
}

/// The subscriber registry of one tracked unit.
///
/// Cloning a `Dep` yields another handle to the same set.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    /// Create a new, empty dependency set.
    pub fn new() -> Self {
        Self::with_inert(false)
    }

    /// Create a set whose subscribe and notify operations do nothing.
    pub fn inert() -> Self {
        Self::with_inert(true)
    }

    fn with_inert(inert: bool) -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::next(),
                inert,
                subscribers: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Get the set's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Whether this set ignores subscriptions and notifications.
    pub fn is_inert(&self) -> bool {
        self.inner.inert
    }

    /// Subscribe the active subscriber, if there is one.
    ///
    /// A subscriber already present is not added twice, but it is still
    /// told about the dependency so it can keep it across re-evaluations.
    pub fn depend(&self) {
        if self.inner.inert {
            return;
        }
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            self.add_sub(&subscriber);
            subscriber.add_dependency(self);
        }
    }

    /// Add a subscriber directly. Returns `false` if it was already present.
    pub fn add_sub(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        if self.inner.inert {
            return false;
        }
        let id = subscriber.id();
        let mut subscribers = self.inner.subscribers.lock();
        if subscribers.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        subscribers.push((id, Arc::downgrade(subscriber)));
        true
    }

    /// Remove a subscriber.
    pub fn remove_sub(&self, id: SubscriberId) {
        self.inner
            .subscribers
            .lock()
            .retain(|(existing, _)| *existing != id);
    }

    /// Check whether the given subscriber is present.
    pub fn has_sub(&self, id: SubscriberId) -> bool {
        self.inner
            .subscribers
            .lock()
            .iter()
            .any(|(existing, _)| *existing == id)
    }

    /// Notify all subscribers that the unit changed.
    ///
    /// The subscriber list is snapshotted first, so subscriptions made while
    /// the pass runs only see the next change. Every live subscriber is
    /// invoked even if an earlier one fails; failures are returned together.
    pub fn notify(&self, change: &Change) -> Result<(), NotifyError> {
        if self.inner.inert {
            return Ok(());
        }

        let snapshot: SubscriberList = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|(_, weak)| weak.strong_count() > 0);
            subscribers.clone()
        };

        trace!(
            dep = self.inner.id.raw(),
            subscribers = snapshot.len(),
            kind = ?change.kind,
            key = change.key.as_deref().unwrap_or(""),
            "notify"
        );

        let mut failures = Vec::new();
        for (id, weak) in snapshot {
            let Some(subscriber) = weak.upgrade() else {
                continue;
            };
            if let Err(source) = subscriber.invalidate(change) {
                failures.push(SubscriberFailure { subscriber: id, source });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError { failures })
        }
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Dep {}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("inert", &self.inner.inert)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
