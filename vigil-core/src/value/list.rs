//! Lists: ordered sequences.
//!
//! Element reads by index cannot be intercepted the way named-field reads
//! can, so lists are tracked at whole-list granularity: the seven in-place
//! operations that change length or order (`push`, `pop`, `shift`,
//! `unshift`, `splice`, `sort_by`, `reverse`) wrap any newly introduced
//! elements, even on shallow wrappers, and notify the list's own dependency
//! set. Consumers subscribe to that set by reading the field that holds the
//! list.
//!
//! Interception is only active once the list has been wrapped, and never
//! for wrappers created in mock mode.

use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Container, ContainerMeta, Integrity, Value};
use crate::change::{Change, ListOp};
use crate::error::ObserveError;
use crate::observer::Observer;

pub(crate) struct ListInner {
    items: RwLock<Vec<Value>>,
    meta: ContainerMeta,
}

/// A shared, ordered sequence of values.
///
/// Cloning a `List` creates a new handle to the **same** list.
#[derive(Clone)]
pub struct List {
    inner: Arc<ListInner>,
}

impl List {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ListInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ListInner>) -> Self {
        Self { inner }
    }

    /// Whether two handles point to the same list.
    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index`, or `Undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.inner
            .items
            .read()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// A snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Iterate over a snapshot of the elements.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.inner.items.read().iter().any(|item| item == value)
    }

    /// Append one element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ObserveError> {
        self.extend([value.into()])
    }

    /// Append several elements. Returns the new length.
    pub fn extend(&self, values: impl IntoIterator<Item = Value>) -> Result<usize, ObserveError> {
        let values: Vec<Value> = values.into_iter().collect();
        let added = values.len();
        self.mutate(
            ListOp::Push,
            |len| len + added,
            |items| {
                items.extend(values.iter().cloned());
                (items.len(), values)
            },
        )
    }

    /// Remove the last element. `Undefined` if the list is empty.
    pub fn pop(&self) -> Result<Value, ObserveError> {
        self.mutate(
            ListOp::Pop,
            |len| len.saturating_sub(1),
            |items| (items.pop().unwrap_or_default(), Vec::new()),
        )
    }

    /// Remove the first element. `Undefined` if the list is empty.
    pub fn shift(&self) -> Result<Value, ObserveError> {
        self.mutate(
            ListOp::Shift,
            |len| len.saturating_sub(1),
            |items| {
                let first = if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                };
                (first, Vec::new())
            },
        )
    }

    /// Insert elements at the front, keeping their order. Returns the new
    /// length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> Result<usize, ObserveError> {
        let values: Vec<Value> = values.into_iter().collect();
        let added = values.len();
        self.mutate(
            ListOp::Unshift,
            |len| len + added,
            |items| {
                items.splice(0..0, values.iter().cloned());
                (items.len(), values)
            },
        )
    }

    /// Remove `delete_count` elements starting at `start` and insert `values`
    /// in their place. Both bounds are clamped to the list. Returns the
    /// removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>, ObserveError> {
        let values: Vec<Value> = values.into_iter().collect();
        let added = values.len();
        let clamp = |len: usize| {
            let start = start.min(len);
            (start, start + delete_count.min(len - start))
        };
        self.mutate(
            ListOp::Splice,
            |len| {
                let (start, end) = clamp(len);
                len - (end - start) + added
            },
            |items| {
                let (start, end) = clamp(items.len());
                let removed: Vec<Value> =
                    items.splice(start..end, values.iter().cloned()).collect();
                (removed, values)
            },
        )
    }

    /// Sort in place with a comparator.
    ///
    /// The comparator runs without the list locked, so it may read the list.
    pub fn sort_by<F>(&self, compare: F) -> Result<(), ObserveError>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let len = self.len();
        self.check_resize(ListOp::Sort, len, len)?;
        let mut sorted = self.to_vec();
        sorted.sort_by(compare);
        self.mutate(
            ListOp::Sort,
            |len| len,
            |items| {
                *items = sorted;
                ((), Vec::new())
            },
        )
    }

    /// Reverse in place.
    pub fn reverse(&self) -> Result<(), ObserveError> {
        self.mutate(
            ListOp::Reverse,
            |len| len,
            |items| {
                items.reverse();
                ((), Vec::new())
            },
        )
    }

    /// Grow to at least `len` elements, padding with `Undefined`. Not
    /// intercepted. Non-extensible lists are left as they are.
    pub(crate) fn grow_to(&self, len: usize) -> Result<(), TryReserveError> {
        if !self.is_extensible() {
            return Ok(());
        }
        let mut items = self.inner.items.write();
        if items.len() < len {
            let additional = len - items.len();
            items.try_reserve(additional)?;
            items.resize(len, Value::Undefined);
        }
        Ok(())
    }

    /// Whether the integrity level allows going from `before` to `after`
    /// elements. Non-extensible lists may shrink, sealed lists keep their
    /// length, frozen lists allow nothing.
    fn check_resize(&self, op: ListOp, before: usize, after: usize) -> Result<(), ObserveError> {
        let blocked = match self.integrity() {
            Integrity::Open => false,
            Integrity::NonExtensible => after > before,
            Integrity::Sealed => after != before,
            Integrity::Frozen => true,
        };
        if blocked {
            return Err(ObserveError::Frozen { op: op.as_str() });
        }
        Ok(())
    }

    /// Run the raw operation, then wrap what it inserted and notify.
    ///
    /// `new_len` predicts the length after the operation from the length
    /// before it. `f` returns the operation's result together with the
    /// elements it introduced (not the ones it merely moved).
    fn mutate<R>(
        &self,
        op: ListOp,
        new_len: impl FnOnce(usize) -> usize,
        f: impl FnOnce(&mut Vec<Value>) -> (R, Vec<Value>),
    ) -> Result<R, ObserveError> {
        let (result, inserted) = {
            let mut items = self.inner.items.write();
            let before = items.len();
            self.check_resize(op, before, new_len(before))?;
            f(&mut items)
        };

        if let Some(observer) = self.intercepting_observer() {
            observer.observe_array(&inserted);
            observer.dep().notify(&Change::list_mutation(op))?;
        }
        Ok(result)
    }

    fn intercepting_observer(&self) -> Option<Arc<Observer>> {
        self.observer().filter(|observer| !observer.is_mock())
    }
}

impl Container for List {
    fn meta(&self) -> &ContainerMeta {
        &self.inner.meta
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                items: RwLock::new(items),
                meta: ContainerMeta::new(),
            }),
        }
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Prints identity and length only; lists may contain themselves.
impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List#{}(len={})", self.id(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(list: &List) -> Vec<f64> {
        list.iter().filter_map(|v| v.as_f64()).collect()
    }

    fn list_of(values: &[i32]) -> List {
        values.iter().map(|&n| Value::from(n)).collect()
    }

    #[test]
    fn push_pop_shift_unshift() {
        let list = List::new();
        assert_eq!(list.push(1).unwrap(), 1);
        assert_eq!(list.extend([Value::from(2), Value::from(3)]).unwrap(), 3);
        assert_eq!(list.unshift([Value::from(-1), Value::from(0)]).unwrap(), 5);
        assert_eq!(numbers(&list), vec![-1.0, 0.0, 1.0, 2.0, 3.0]);

        assert_eq!(list.pop().unwrap(), Value::from(3));
        assert_eq!(list.shift().unwrap(), Value::from(-1));
        assert_eq!(numbers(&list), vec![0.0, 1.0, 2.0]);

        let empty = List::new();
        assert!(empty.pop().unwrap().is_undefined());
        assert!(empty.shift().unwrap().is_undefined());
    }

    #[test]
    fn splice_clamps_bounds() {
        let list = list_of(&[1, 2, 3, 4]);

        let removed = list.splice(1, 2, [Value::from(9)]).unwrap();
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(numbers(&list), vec![1.0, 9.0, 4.0]);

        let removed = list.splice(10, 5, [Value::from(5)]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(numbers(&list), vec![1.0, 9.0, 4.0, 5.0]);

        let removed = list.splice(2, 100, Vec::new()).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(numbers(&list), vec![1.0, 9.0]);
    }

    #[test]
    fn sort_and_reverse() {
        let list = list_of(&[3, 1, 2]);
        list.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        })
        .unwrap();
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);

        list.reverse().unwrap();
        assert_eq!(numbers(&list), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn frozen_and_sealed_lists_reject_mutation() {
        let sealed = list_of(&[2, 1]);
        sealed.seal();
        assert!(matches!(sealed.push(3), Err(ObserveError::Frozen { op: "push" })));
        sealed.reverse().unwrap();
        assert_eq!(numbers(&sealed), vec![1.0, 2.0]);

        let frozen = list_of(&[1]);
        frozen.freeze();
        assert!(frozen.reverse().is_err());
        assert!(frozen.pop().is_err());
        assert_eq!(frozen.len(), 1);
    }

    #[test]
    fn grow_to_pads_with_undefined() {
        let list = list_of(&[1]);
        list.grow_to(3).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.get(2).is_undefined());
        list.grow_to(1).unwrap();
        assert_eq!(list.len(), 3);

        assert!(list.grow_to(usize::MAX).is_err());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn non_extensible_lists_may_shrink_and_replace() {
        let list = list_of(&[1, 2, 3, 4]);
        list.prevent_extensions();

        assert_eq!(list.pop().unwrap(), Value::from(4));
        assert_eq!(list.shift().unwrap(), Value::from(1));
        assert_eq!(list.splice(0, 1, [Value::from(9)]).unwrap(), vec![Value::from(2)]);
        assert_eq!(numbers(&list), vec![9.0, 3.0]);

        assert!(matches!(list.push(5), Err(ObserveError::Frozen { op: "push" })));
        assert!(list.unshift([Value::from(0)]).is_err());
        assert!(list.splice(0, 1, [Value::from(7), Value::from(8)]).is_err());
        assert_eq!(numbers(&list), vec![9.0, 3.0]);

        // Empty input grows nothing.
        assert_eq!(list.extend(Vec::new()).unwrap(), 2);
    }

    #[test]
    fn sealed_lists_keep_their_length() {
        let list = list_of(&[1, 2]);
        list.seal();

        list.splice(1, 1, [Value::from(5)]).unwrap();
        assert_eq!(numbers(&list), vec![1.0, 5.0]);
        assert!(list.pop().is_err());
        assert!(list.splice(0, 1, Vec::new()).is_err());

        let empty = List::new();
        empty.seal();
        assert!(empty.pop().unwrap().is_undefined());
    }

    #[test]
    fn shallow_wrappers_still_wrap_inserted_elements() {
        let value = Value::from(serde_json::json!([{ "a": 1 }]));
        crate::observer::observe(&value, true, false).unwrap();
        let list = value.as_list().unwrap();
        assert!(list.get(0).observer().is_none());

        let pushed = Value::from(serde_json::json!({ "a": 2 }));
        list.push(pushed.clone()).unwrap();
        assert!(pushed.observer().is_some());

        let spliced = Value::from(serde_json::json!({ "a": 3 }));
        list.splice(0, 1, [spliced.clone()]).unwrap();
        assert!(spliced.observer().is_some());
    }
}
