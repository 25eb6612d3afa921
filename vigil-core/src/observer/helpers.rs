//! Structural helpers.
//!
//! Plain assignment cannot intercept a field that did not exist when the
//! record was wrapped, and plain removal notifies nobody. [`set`] and [`del`]
//! add and remove fields (or list slots) in a way that is tracked.

use tracing::debug;

use super::{define_reactive, observe, FieldOptions};
use crate::change::Change;
use crate::error::{report, ObserveError};
use crate::value::{Container, Key, List, Record, Value};

/// Largest index a list slot may be assigned at.
const MAX_INDEX: usize = u32::MAX as usize - 1;

/// Assign `target[key] = value` so that the result is tracked, adding the
/// field if it is new. Returns the assigned value.
///
/// - On a list with an index key the slot is replaced through the
///   intercepted `splice`, growing the list first if needed.
/// - On a record with an existing field this is an ordinary write.
/// - A new field on a wrapped record is intercepted and the record's
///   whole-container set is notified, so consumers that enumerated the
///   record re-run.
///
/// Misuse (a primitive target, a read-only target, adding to a root state
/// container) is reported; see [`crate::error`].
pub fn set(
    target: &Value,
    key: impl Into<Key>,
    value: impl Into<Value>,
) -> Result<Value, ObserveError> {
    let key = key.into();
    let value = value.into();

    let Some(container) = target.as_container() else {
        report(ObserveError::InvalidTarget { op: "set" })?;
        return Ok(Value::Undefined);
    };
    if container.is_readonly() {
        report(ObserveError::Readonly {
            op: "set",
            key: key.to_string(),
        })?;
        return Ok(Value::Undefined);
    }

    match target {
        Value::List(list) => set_index(list, &key, value),
        Value::Record(record) => set_field(record, &key.to_string(), value),
        _ => Ok(Value::Undefined),
    }
}

fn set_index(list: &List, key: &Key, value: Value) -> Result<Value, ObserveError> {
    let index = key.as_index().filter(|&index| index <= MAX_INDEX);
    let grown = index.map(|index| list.grow_to(list.len().max(index)));
    let (Some(index), Some(Ok(()))) = (index, grown) else {
        report(ObserveError::InvalidIndex {
            op: "set",
            key: key.to_string(),
        })?;
        return Ok(Value::Undefined);
    };

    if let Err(err) = list.splice(index, 1, [value.clone()]) {
        degrade(err)?;
        return Ok(Value::Undefined);
    }

    // Mock wrappers do not intercept list operations, so the splice above
    // wrapped nothing.
    if let Some(observer) = list.observer() {
        if observer.is_mock() && !observer.is_shallow() {
            observe(&value, false, true);
        }
    }
    Ok(value)
}

fn set_field(record: &Record, key: &str, value: Value) -> Result<Value, ObserveError> {
    if record.contains_key(key) {
        record.set(key, value.clone())?;
        return Ok(value);
    }

    let observer = record.observer();
    if observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
        report(ObserveError::RootMutation {
            op: "adding",
            key: key.to_string(),
        })?;
        return Ok(value);
    }

    let Some(observer) = observer else {
        record.set(key, value.clone())?;
        return Ok(value);
    };

    let options = FieldOptions::default()
        .initial(value.clone())
        .shallow(observer.is_shallow())
        .mock(observer.is_mock());
    if define_reactive(record, key, options).is_none() {
        debug!(record = record.id(), key, "field could not be added");
        return Ok(value);
    }

    observer.dep().notify(&Change::add(key, value.clone()))?;
    Ok(value)
}

/// Remove `target[key]` and notify the container's consumers.
///
/// On a list the slot is removed through the intercepted `splice`. Removing
/// a field that does not exist, or cannot be removed, does nothing.
pub fn del(target: &Value, key: impl Into<Key>) -> Result<(), ObserveError> {
    let key = key.into();

    let Some(container) = target.as_container() else {
        return report(ObserveError::InvalidTarget { op: "delete" });
    };
    if container.is_readonly() {
        return report(ObserveError::Readonly {
            op: "delete",
            key: key.to_string(),
        });
    }

    match target {
        Value::List(list) => match key.as_index() {
            Some(index) => match list.splice(index, 1, Vec::new()) {
                Ok(_) => Ok(()),
                Err(err) => degrade(err),
            },
            None => report(ObserveError::InvalidIndex {
                op: "delete",
                key: key.to_string(),
            }),
        },
        Value::Record(record) => del_field(record, &key.to_string()),
        _ => Ok(()),
    }
}

/// Integrity violations on a list are misuse, reported like the others.
/// Subscriber failures still propagate.
fn degrade(err: ObserveError) -> Result<(), ObserveError> {
    match err {
        ObserveError::Frozen { .. } => report(err),
        err => Err(err),
    }
}

fn del_field(record: &Record, key: &str) -> Result<(), ObserveError> {
    let observer = record.observer();
    if observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
        return report(ObserveError::RootMutation {
            op: "deleting",
            key: key.to_string(),
        });
    }

    if !record.contains_key(key) || !record.remove(key) {
        return Ok(());
    }

    match observer {
        Some(observer) => Ok(observer.dep().notify(&Change::delete(key))?),
        None => Ok(()),
    }
}
