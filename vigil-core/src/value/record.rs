//! Records: containers of named fields.
//!
//! A record maps field names to properties, in insertion order. A property
//! is either a data slot or an accessor pair (a derived field), and carries
//! `configurable` and `enumerable` flags.
//!
//! Reads and writes go through [`Record::get`] and [`Record::set`]. Once a
//! field has been intercepted (see [`crate::observer::define_reactive`]),
//! these accessors track reads and notify on writes; otherwise they behave
//! like plain storage. Assigning a field that does not exist adds it
//! untracked, which is why the structural [`crate::set`] helper exists.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{Container, ContainerMeta, Integrity, Value};
use crate::error::ObserveError;
use crate::observer::FieldTracker;
use crate::reactive::Dep;

/// Getter of a derived field. Receives the record it is read from.
pub type Getter = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Setter of a derived field.
pub type Setter = Arc<dyn Fn(&Record, Value) + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

pub(crate) struct Property {
    slot: Slot,
    configurable: bool,
    enumerable: bool,
    tracker: Option<Arc<FieldTracker>>,
}

impl Property {
    fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            configurable: true,
            enumerable: true,
            tracker: None,
        }
    }
}

/// Describes a property for [`Record::define_property`].
#[derive(Clone)]
pub struct PropertyDescriptor {
    slot: Slot,
    configurable: bool,
    enumerable: bool,
}

impl PropertyDescriptor {
    /// A data property holding `value`.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data(value.into()),
            configurable: true,
            enumerable: true,
        }
    }

    /// A derived field computed by `get`. Without a setter, writes to it
    /// are dropped.
    pub fn accessor<G>(get: G) -> Self
    where
        G: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self {
            slot: Slot::Accessor {
                get: Some(Arc::new(get)),
                set: None,
            },
            configurable: true,
            enumerable: true,
        }
    }

    /// Attach a setter to an accessor descriptor.
    pub fn with_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&Record, Value) + Send + Sync + 'static,
    {
        if let Slot::Accessor { set: slot, .. } = &mut self.slot {
            *slot = Some(Arc::new(set));
        }
        self
    }

    /// A non-configurable property can never be intercepted or removed.
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// Non-enumerable properties are skipped by [`Record::keys`] and
    /// therefore by wrapping.
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }
}

pub(crate) struct RecordInner {
    props: RwLock<IndexMap<String, Property>>,
    meta: ContainerMeta,
}

/// A shared record of named fields.
///
/// Cloning a `Record` creates a new handle to the **same** record.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RecordInner {
                props: RwLock::new(IndexMap::new()),
                meta: ContainerMeta::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<RecordInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<RecordInner>) -> Self {
        Self { inner }
    }

    /// Whether two handles point to the same record.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.props.read().contains_key(key)
    }

    /// Enumerable field names, in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .props
            .read()
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Read a field.
    ///
    /// If the field is intercepted and a subscriber is active, the read is
    /// tracked. Missing fields read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        let (slot, tracker) = {
            let props = self.inner.props.read();
            match props.get(key) {
                Some(prop) => (prop.slot.clone(), prop.tracker.clone()),
                None => return Value::Undefined,
            }
        };

        let value = self.resolve(&slot);
        if let Some(tracker) = tracker {
            tracker.depend(&value);
        }
        value
    }

    /// Assign a field.
    ///
    /// Intercepted fields compare, store and notify. Other fields are stored
    /// untracked. A new field is added untracked when the record is
    /// extensible and silently dropped otherwise; frozen records ignore
    /// every write.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), ObserveError> {
        let value = value.into();
        if self.is_frozen() {
            trace!(record = self.id(), key, "write to frozen record ignored");
            return Ok(());
        }

        let existing = {
            let props = self.inner.props.read();
            props
                .get(key)
                .map(|prop| (prop.slot.clone(), prop.tracker.clone()))
        };

        match existing {
            None => {
                self.insert_plain(key, value);
                Ok(())
            }
            Some((slot, None)) => {
                self.write_plain(key, &slot, value);
                Ok(())
            }
            Some((slot, Some(tracker))) => tracker.write(self, key, &slot, value),
        }
    }

    /// Remove a field without notifying anyone.
    ///
    /// Returns `false` if the field exists but cannot be removed (it is
    /// non-configurable, or the record is sealed).
    pub fn remove(&self, key: &str) -> bool {
        let sealed = self.integrity() >= Integrity::Sealed;
        let mut props = self.inner.props.write();
        match props.get(key) {
            None => true,
            Some(prop) if sealed || !prop.configurable => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
        }
    }

    /// Define or redefine a property.
    ///
    /// Redefining drops any interception installed on the field. Returns
    /// `false` if the field is not configurable, or if it is new and the
    /// record is not extensible.
    pub fn define_property(&self, key: &str, descriptor: PropertyDescriptor) -> bool {
        let integrity = self.integrity();
        let mut props = self.inner.props.write();
        match props.get_mut(key) {
            Some(prop) => {
                if integrity >= Integrity::Sealed || !prop.configurable {
                    return false;
                }
                prop.slot = descriptor.slot;
                prop.configurable = descriptor.configurable;
                prop.enumerable = descriptor.enumerable;
                prop.tracker = None;
                true
            }
            None => {
                if integrity != Integrity::Open {
                    return false;
                }
                props.insert(
                    key.to_string(),
                    Property {
                        slot: descriptor.slot,
                        configurable: descriptor.configurable,
                        enumerable: descriptor.enumerable,
                        tracker: None,
                    },
                );
                true
            }
        }
    }

    /// Whether the field has interception installed.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.inner
            .props
            .read()
            .get(key)
            .is_some_and(|prop| prop.tracker.is_some())
    }

    /// The dependency set of an intercepted field.
    pub fn field_dep(&self, key: &str) -> Option<Dep> {
        self.inner
            .props
            .read()
            .get(key)
            .and_then(|prop| prop.tracker.as_ref().map(|t| t.dep().clone()))
    }

    // ------------------------------------------------------------------------
    // Crate-internal access for field interception
    // ------------------------------------------------------------------------

    /// The field's slot and whether it can currently be reconfigured.
    pub(crate) fn field_parts(&self, key: &str) -> Option<(Slot, bool)> {
        let sealed = self.integrity() >= Integrity::Sealed;
        self.inner
            .props
            .read()
            .get(key)
            .map(|prop| (prop.slot.clone(), prop.configurable && !sealed))
    }

    /// Resolve a slot to its current value. Never holds the lock while a
    /// getter runs, so getters may read the record.
    pub(crate) fn resolve(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Data(value) => value.clone(),
            Slot::Accessor { get: Some(get), .. } => get(self),
            Slot::Accessor { get: None, .. } => Value::Undefined,
        }
    }

    /// Install interception on a field, creating it if missing. `data`
    /// replaces the stored value of data fields; accessor fields keep
    /// deferring to their getter and setter.
    pub(crate) fn install_tracker(
        &self,
        key: &str,
        data: Option<Value>,
        tracker: Arc<FieldTracker>,
    ) -> bool {
        let integrity = self.integrity();
        let mut props = self.inner.props.write();
        match props.get_mut(key) {
            Some(prop) => {
                if integrity >= Integrity::Sealed || !prop.configurable {
                    return false;
                }
                if let (Slot::Data(stored), Some(value)) = (&mut prop.slot, data) {
                    *stored = value;
                }
                prop.enumerable = true;
                prop.tracker = Some(tracker);
                true
            }
            None => {
                if integrity != Integrity::Open {
                    return false;
                }
                let mut prop = Property::data(data.unwrap_or_default());
                prop.tracker = Some(tracker);
                props.insert(key.to_string(), prop);
                true
            }
        }
    }

    /// Overwrite the stored value of a data field.
    pub(crate) fn store_data(&self, key: &str, value: Value) {
        if let Some(prop) = self.inner.props.write().get_mut(key) {
            if let Slot::Data(stored) = &mut prop.slot {
                *stored = value;
            }
        }
    }

    fn insert_plain(&self, key: &str, value: Value) {
        if !self.is_extensible() {
            trace!(record = self.id(), key, "new field on non-extensible record dropped");
            return;
        }
        self.inner
            .props
            .write()
            .insert(key.to_string(), Property::data(value));
    }

    fn write_plain(&self, key: &str, slot: &Slot, value: Value) {
        match slot {
            Slot::Data(_) => self.store_data(key, value),
            Slot::Accessor { set: Some(set), .. } => set(self, value),
            Slot::Accessor { set: None, .. } => {}
        }
    }
}

impl Container for Record {
    fn meta(&self) -> &ContainerMeta {
        &self.inner.meta
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let props = iter
            .into_iter()
            .map(|(key, value)| (key.into(), Property::data(value.into())))
            .collect();
        Self {
            inner: Arc::new(RecordInner {
                props: RwLock::new(props),
                meta: ContainerMeta::new(),
            }),
        }
    }
}

/// Prints identity and field names only; records may contain themselves.
impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record#{} ", self.id())?;
        f.debug_list().entries(self.keys()).finish()
    }
}
