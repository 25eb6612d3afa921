//! Vigil Core
//!
//! Fine-grained dependency tracking for plain data containers. Wrapping a
//! record or list makes every read of its fields, performed while some
//! computation is active, register that computation as dependent; every
//! write that actually changes a value notifies exactly the computations
//! that read it.
//!
//! It implements:
//!
//! - Dependency sets and the active-subscriber register
//! - Container wrappers, attached once per container and reused
//! - Field interception for records, in-place operation interception for
//!   lists
//! - Structural helpers to add and remove fields in a tracked way
//!
//! Scheduling is out of scope: subscribers are invoked synchronously, in
//! subscription order, and decide for themselves what to do with it.
//!
//! # Architecture
//!
//! - `reactive`: dependency sets, subscribers, the active-subscriber stack
//! - `observer`: container wrappers, field interception, `set` and `del`
//! - `value`: the record and list containers and the values they hold
//! - `config`: per-thread settings (observing, server rendering, strict)
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use vigil_core::reactive::{with_active_subscriber, Notifier, Subscriber};
//! use vigil_core::{observe, Value};
//!
//! let state = Value::from(json!({ "user": { "name": "ada" } }));
//! observe(&state, false, false);
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let runs_clone = runs.clone();
//! let subscriber: Arc<dyn Subscriber> = Arc::new(Notifier::new(move |_| {
//!     runs_clone.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! // Reading inside the subscriber's context subscribes it.
//! let user = with_active_subscriber(subscriber.clone(), || state.get("user"));
//! let user = user.as_record().unwrap();
//! with_active_subscriber(subscriber.clone(), || user.get("name"));
//!
//! user.set("name", "grace").unwrap();
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//!
//! // Writing the same value again is not a change.
//! user.set("name", "grace").unwrap();
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```

pub mod change;
pub mod config;
pub mod equality;
pub mod error;
pub mod observer;
pub mod reactive;
pub mod value;

pub use change::{Change, ChangeKind, ListOp};
pub use config::{should_observe, toggle_observing, Settings};
pub use error::{NotifyError, ObserveError};
pub use observer::{
    define_reactive, del, observe, observe_root, set, FieldOptions, Observer,
};
pub use value::{Container, Integrity, Key, List, PropertyDescriptor, Record, Value};
