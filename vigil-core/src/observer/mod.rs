//! Container Wrappers
//!
//! An [`Observer`] is attached to every container the engine tracks. It owns
//! the container's whole-container dependency set and remembers how the
//! container was wrapped (shallow, mock) so that values added later are
//! wrapped the same way.
//!
//! # How Wrapping Works
//!
//! 1. [`observe`] checks that the value is an eligible container: a record
//!    or list that is extensible, not marked raw, and encountered while
//!    observing is enabled (and, outside mock mode, outside server
//!    rendering).
//!
//! 2. If the container already carries a wrapper, that wrapper is returned.
//!    Otherwise a new one is attached *before* the contents are walked, so
//!    cyclic structures terminate.
//!
//! 3. Records get field interception on every enumerable field (see
//!    [`define_reactive`]); lists get their current elements wrapped unless
//!    the wrapper is shallow.
//!
//! # Memory Layout
//!
//! The container holds its wrapper strongly and the wrapper points back
//! weakly, so the pair is dropped together with the container.

mod define;
mod helpers;

pub use define::{define_reactive, ChangeGuard, FieldOptions};
pub use helpers::{del, set};

pub(crate) use define::FieldTracker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::config;
use crate::reactive::Dep;
use crate::value::{Container, List, ListInner, Record, RecordInner, Value};

enum Target {
    Record(Weak<RecordInner>),
    List(Weak<ListInner>),
}

/// Per-container tracking metadata.
pub struct Observer {
    target: Target,
    dep: Dep,
    shallow: bool,
    mock: bool,
    /// Number of root-level consumers using the container as their state.
    root_count: AtomicUsize,
}

impl Observer {
    fn attach(value: &Value, shallow: bool, mock: bool) -> Option<Arc<Observer>> {
        let (target, container): (Target, &dyn Container) = match value {
            Value::Record(record) => (Target::Record(record.downgrade()), record as &dyn Container),
            Value::List(list) => (Target::List(list.downgrade()), list as &dyn Container),
            _ => return None,
        };

        let observer = Arc::new(Observer {
            target,
            dep: if mock { Dep::inert() } else { Dep::new() },
            shallow,
            mock,
            root_count: AtomicUsize::new(0),
        });

        if let Err(existing) = container.meta().attach(observer.clone()) {
            return Some(existing);
        }

        trace!(container = container.id(), shallow, mock, "observe");

        match value {
            Value::List(list) => {
                if !shallow {
                    observer.observe_array(&list.to_vec());
                }
            }
            Value::Record(record) => {
                for key in record.keys() {
                    define_reactive(
                        record,
                        &key,
                        FieldOptions::default().shallow(shallow).mock(mock),
                    );
                }
            }
            _ => {}
        }

        Some(observer)
    }

    /// The whole-container dependency set.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// The wrapped container, while it is alive.
    pub fn value(&self) -> Option<Value> {
        match &self.target {
            Target::Record(weak) => weak.upgrade().map(|inner| Value::Record(Record::from_inner(inner))),
            Target::List(weak) => weak.upgrade().map(|inner| Value::List(List::from_inner(inner))),
        }
    }

    /// Wrap every eligible element of `items`.
    pub fn observe_array(&self, items: &[Value]) {
        for item in items {
            observe(item, false, self.mock);
        }
    }

    /// Number of root-level consumers using this container as their state.
    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::Relaxed)
    }

    /// Register one more root-level consumer.
    pub fn retain_root(&self) {
        self.root_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Unregister a root-level consumer.
    pub fn release_root(&self) {
        let _ = self
            .root_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep.id())
            .field("shallow", &self.shallow)
            .field("mock", &self.mock)
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Wrap `value` if it is an eligible container.
///
/// Returns the container's wrapper (new or existing), or `None` for
/// primitives and for containers that may not be wrapped right now.
pub fn observe(value: &Value, shallow: bool, mock: bool) -> Option<Arc<Observer>> {
    let container = value.as_container()?;
    if let Some(existing) = container.observer() {
        return Some(existing);
    }

    let eligible = config::should_observe()
        && (mock || !config::is_server_rendering())
        && container.is_extensible()
        && !container.is_raw();
    if !eligible {
        return None;
    }

    Observer::attach(value, shallow, mock)
}

/// Wrap `value` as the root state of a consumer.
///
/// The root count makes the structural helpers refuse to add or remove
/// top-level fields; see [`set`] and [`del`].
pub fn observe_root(value: &Value) -> Option<Arc<Observer>> {
    let observer = observe(value, false, false)?;
    observer.retain_root();
    Some(observer)
}

/// Subscribe the active subscriber to every wrapped element of `list`,
/// recursing into nested lists.
///
/// Element access inside a list cannot be intercepted, so reading the field
/// that holds a list must subscribe to everything reachable through it.
pub(crate) fn depend_array(list: &List) {
    let mut visited = vec![list.id()];
    depend_elements(list, &mut visited);
}

fn depend_elements(list: &List, visited: &mut Vec<u64>) {
    for item in list.iter() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::List(inner) = &item {
            if !visited.contains(&inner.id()) {
                visited.push(inner.id());
                depend_elements(inner, visited);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn primitives_are_not_observed() {
        assert!(observe(&Value::from(1), false, false).is_none());
        assert!(observe(&Value::Null, false, false).is_none());
        assert!(observe(&Value::from("s"), false, false).is_none());
    }

    #[test]
    fn observe_is_idempotent() {
        let value = data(json!({ "a": 1 }));
        let first = observe(&value, false, false).unwrap();
        let second = observe(&value, false, false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dep().id(), second.dep().id());
        assert!(Arc::ptr_eq(&value.observer().unwrap(), &first));
    }

    #[test]
    fn observe_walks_nested_containers() {
        let value = data(json!({ "a": { "b": [ { "c": 1 }, 2 ] } }));
        observe(&value, false, false).unwrap();

        let record = value.as_record().unwrap();
        assert!(record.is_tracked("a"));

        let a = record.get("a");
        assert!(a.observer().is_some());
        assert!(a.as_record().unwrap().is_tracked("b"));

        let list = a.get("b");
        assert!(list.observer().is_some());
        assert!(list.as_list().unwrap().get(0).observer().is_some());
    }

    #[test]
    fn shallow_only_intercepts_top_level() {
        let value = data(json!({ "a": { "b": 1 }, "l": [ { "c": 1 } ] }));
        observe(&value, true, false).unwrap();

        let record = value.as_record().unwrap();
        assert!(record.is_tracked("a"));
        assert!(record.get("a").observer().is_none());

        let shallow_list = data(json!([ { "c": 1 } ]));
        observe(&shallow_list, true, false).unwrap();
        assert!(shallow_list.as_list().unwrap().get(0).observer().is_none());
    }

    #[test]
    fn ineligible_containers() {
        let frozen = Record::new();
        frozen.freeze();
        assert!(observe(&Value::from(frozen), false, false).is_none());

        let raw = List::new();
        raw.mark_raw();
        assert!(observe(&Value::from(raw), false, false).is_none());

        let value = data(json!({}));
        config::without_observing(|| assert!(observe(&value, false, false).is_none()));
        assert!(observe(&value, false, false).is_some());
    }

    #[test]
    fn server_rendering_requires_mock() {
        config::set_server_rendering(true);
        let plain = data(json!({ "a": 1 }));
        let mocked = data(json!([1]));

        assert!(observe(&plain, false, false).is_none());
        let observer = observe(&mocked, false, true).unwrap();
        config::set_server_rendering(false);

        assert!(observer.is_mock());
        assert!(observer.dep().is_inert());
    }

    #[test]
    fn cycles_terminate() {
        let record = Record::new();
        record.set("me", record.clone()).unwrap();
        let list = List::new();
        list.push(list.clone()).unwrap();
        record.set("list", list.clone()).unwrap();

        let value = Value::from(record.clone());
        let observer = observe(&value, false, false).unwrap();
        assert!(Arc::ptr_eq(&record.get("me").observer().unwrap(), &observer));
        assert!(list.observer().is_some());

        // Reading through the cycle must also terminate.
        depend_array(&list);
    }

    #[test]
    fn root_count() {
        let value = data(json!({ "a": 1 }));
        let observer = observe_root(&value).unwrap();
        assert_eq!(observer.root_count(), 1);

        observer.release_root();
        observer.release_root();
        assert_eq!(observer.root_count(), 0);
    }

    #[test]
    fn observer_points_back_to_its_container() {
        let value = data(json!([1, 2]));
        let observer = observe(&value, false, false).unwrap();
        assert_eq!(observer.value(), Some(value.clone()));

        drop(value);
        assert!(observer.value().is_none());
    }
}
