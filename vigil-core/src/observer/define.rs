//! Field Interception
//!
//! [`define_reactive`] installs tracking on one field of a record: a
//! dedicated dependency set, plus the wrapper of the field's current value
//! when that value is itself a container (the field's "child").
//!
//! # Reads
//!
//! Reading the field with an active subscriber subscribes it to the field's
//! set and, when there is a child, to the child's whole-container set too,
//! so replacing something deep inside still invalidates a consumer that only
//! read the outer field. When the value is a list, every wrapped element is
//! subscribed as well (see [`depend_array`]).
//!
//! # Writes
//!
//! A write that does not change the value (see [`has_changed`]) does
//! nothing. Otherwise the value is stored, or handed to the derived setter
//! if the field has one; a derived field without a setter drops the write.
//! The new value becomes the field's child if it can be wrapped, and the
//! field's set is notified.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{depend_array, observe, Observer};
use crate::change::Change;
use crate::equality::has_changed;
use crate::error::ObserveError;
use crate::reactive::{Dep, ReactiveContext};
use crate::value::{Container, Record, Slot, Value};

/// Called with the field name right before a changing write is applied.
/// Hosts use it to flag writes that should not happen, such as a consumer
/// mutating a value it was handed from above.
pub type ChangeGuard = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for [`define_reactive`].
#[derive(Clone, Default)]
pub struct FieldOptions {
    initial: Option<Value>,
    guard: Option<ChangeGuard>,
    shallow: bool,
    mock: bool,
}

impl FieldOptions {
    /// Start the field with this value instead of its current one.
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Do not wrap the field's value.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    /// Wrap the field's value in mock mode.
    pub fn mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }
}

/// Tracking state of one intercepted field.
pub(crate) struct FieldTracker {
    dep: Dep,
    child: Mutex<Option<Arc<Observer>>>,
    guard: Option<ChangeGuard>,
    shallow: bool,
    mock: bool,
}

impl FieldTracker {
    pub(crate) fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Track a read that resolved to `value`.
    pub(crate) fn depend(&self, value: &Value) {
        if !ReactiveContext::is_tracking() {
            return;
        }
        self.dep.depend();

        let child = self.child.lock().clone();
        if let Some(child) = child {
            child.dep().depend();
            if let Value::List(list) = value {
                depend_array(list);
            }
        }
    }

    /// Apply a write of `new` to the field `key`, whose slot was `slot`.
    pub(crate) fn write(
        &self,
        record: &Record,
        key: &str,
        slot: &Slot,
        new: Value,
    ) -> Result<(), ObserveError> {
        let old = record.resolve(slot);
        if !has_changed(&old, &new) {
            return Ok(());
        }
        if let Some(guard) = &self.guard {
            guard(key);
        }

        match slot {
            Slot::Accessor { set: Some(set), .. } => set(record, new.clone()),
            // Derived field without a setter.
            Slot::Accessor { .. } => return Ok(()),
            Slot::Data(_) => record.store_data(key, new.clone()),
        }

        let child = if self.shallow {
            None
        } else {
            observe(&new, false, self.mock)
        };
        *self.child.lock() = child;

        self.dep
            .notify(&Change::set(key, Some(old), Some(new)))
            .map_err(ObserveError::from)
    }
}

/// Install tracking on `record[key]`.
///
/// Returns the field's dependency set, or `None` when the field cannot be
/// intercepted: it is non-configurable, or it is missing and the record is
/// not extensible. Non-configurable fields are skipped silently; that is how
/// a host opts a field out of tracking.
pub fn define_reactive(record: &Record, key: &str, options: FieldOptions) -> Option<Dep> {
    let slot = match record.field_parts(key) {
        Some((_, false)) => return None,
        Some((slot, true)) => Some(slot),
        None => None,
    };

    let (has_getter, has_setter) = match &slot {
        Some(Slot::Accessor { get, set }) => (get.is_some(), set.is_some()),
        _ => (false, false),
    };

    let value = match options.initial {
        Some(initial) => initial,
        None if !has_getter || has_setter => {
            slot.as_ref().map(|s| record.resolve(s)).unwrap_or_default()
        }
        None => Value::Undefined,
    };

    let child = if options.shallow {
        None
    } else {
        observe(&value, false, options.mock)
    };

    let tracker = Arc::new(FieldTracker {
        dep: Dep::new(),
        child: Mutex::new(child),
        guard: options.guard,
        shallow: options.shallow,
        mock: options.mock,
    });
    let dep = tracker.dep.clone();

    let data = match slot {
        Some(Slot::Accessor { .. }) => None,
        _ => Some(value),
    };
    if !record.install_tracker(key, data, tracker) {
        return None;
    }

    trace!(record = record.id(), key, "field intercepted");
    Some(dep)
}
