//! Values and Containers
//!
//! The engine tracks two kinds of containers: [`Record`]s (named fields) and
//! [`List`]s (ordered sequences). Both are shared handles, so the same
//! container can be reachable from several parents; identity is pointer
//! identity.
//!
//! Everything else a field can hold is a plain [`Value`] that is never
//! wrapped.
//!
//! # Container Metadata
//!
//! Each container carries a [`ContainerMeta`]: the slot holding its
//! [`Observer`] once wrapped, its [`Integrity`] level, a "skip tracking"
//! marker and a read-only marker. The [`Container`] trait exposes the
//! operations on that metadata for both container kinds.

mod list;
mod record;

pub use list::List;
pub use record::{Getter, PropertyDescriptor, Record, Setter};

pub(crate) use list::ListInner;
pub(crate) use record::{RecordInner, Slot};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::observer::Observer;

/// Counter for generating unique container IDs.
static CONTAINER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How far a container has been locked down.
///
/// Levels are ordered: each one implies the restrictions of the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Integrity {
    /// New fields and elements may be added.
    #[default]
    Open,
    /// Nothing can be added; existing entries stay mutable and removable.
    NonExtensible,
    /// Nothing can be added or removed, and no field can be reconfigured.
    Sealed,
    /// Nothing can change at all.
    Frozen,
}

/// Metadata attached to every container.
pub struct ContainerMeta {
    id: u64,
    observer: OnceLock<Arc<Observer>>,
    integrity: Mutex<Integrity>,
    skip: AtomicBool,
    readonly: AtomicBool,
}

impl ContainerMeta {
    pub(crate) fn new() -> Self {
        Self {
            id: CONTAINER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            observer: OnceLock::new(),
            integrity: Mutex::new(Integrity::Open),
            skip: AtomicBool::new(false),
            readonly: AtomicBool::new(false),
        }
    }

    pub(crate) fn observer(&self) -> Option<Arc<Observer>> {
        self.observer.get().cloned()
    }

    /// Attach a wrapper. If one is already attached, that one is returned
    /// in the error position.
    pub(crate) fn attach(&self, observer: Arc<Observer>) -> Result<(), Arc<Observer>> {
        let attached = self.observer.get_or_init(|| observer.clone());
        if Arc::ptr_eq(attached, &observer) {
            Ok(())
        } else {
            Err(attached.clone())
        }
    }

    pub(crate) fn integrity(&self) -> Integrity {
        *self.integrity.lock()
    }

    fn restrict(&self, level: Integrity) {
        let mut integrity = self.integrity.lock();
        if level > *integrity {
            *integrity = level;
        }
    }
}

/// Operations shared by [`Record`] and [`List`].
pub trait Container {
    #[doc(hidden)]
    fn meta(&self) -> &ContainerMeta;

    /// Stable identity of this container.
    fn id(&self) -> u64 {
        self.meta().id
    }

    /// The wrapper attached to this container, if it has been observed.
    fn observer(&self) -> Option<Arc<Observer>> {
        self.meta().observer()
    }

    fn integrity(&self) -> Integrity {
        self.meta().integrity()
    }

    fn prevent_extensions(&self) {
        self.meta().restrict(Integrity::NonExtensible);
    }

    fn seal(&self) {
        self.meta().restrict(Integrity::Sealed);
    }

    fn freeze(&self) {
        self.meta().restrict(Integrity::Frozen);
    }

    fn is_extensible(&self) -> bool {
        self.integrity() == Integrity::Open
    }

    fn is_frozen(&self) -> bool {
        self.integrity() == Integrity::Frozen
    }

    /// Mark this container so it is never wrapped.
    fn mark_raw(&self) {
        self.meta().skip.store(true, Ordering::Relaxed);
    }

    fn is_raw(&self) -> bool {
        self.meta().skip.load(Ordering::Relaxed)
    }

    /// Mark this container read-only for the structural helpers.
    fn mark_readonly(&self) {
        self.meta().readonly.store(true, Ordering::Relaxed);
    }

    fn is_readonly(&self) -> bool {
        self.meta().readonly.load(Ordering::Relaxed)
    }
}

/// A value a field or element can hold.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Record(Record),
    List(List),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// The container metadata, if this value is a container.
    pub fn as_container(&self) -> Option<&dyn Container> {
        match self {
            Value::Record(record) => Some(record),
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.as_container().is_some()
    }

    /// The wrapper attached to this value, if it is an observed container.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.as_container().and_then(|c| c.observer())
    }

    /// Read a field, tracking the read. `Undefined` for non-records.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Record(record) => record.get(key),
            _ => Value::Undefined,
        }
    }
}

/// Strict equality: containers by identity, everything else by value.
/// NaN is not equal to itself here; see [`crate::equality::has_changed`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Record(record) => fmt::Debug::fmt(record, f),
            Value::List(list) => fmt::Debug::fmt(list, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(List::from(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Host data converts into fresh, unobserved containers.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Record(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// A field name or list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The list index this key denotes, if any. Names that spell a
    /// non-negative integer count as indices.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => name.parse().ok(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}
