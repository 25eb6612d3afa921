//! Reactive Tracking
//!
//! This module implements the tracking half of the engine: dependency sets,
//! the active-subscriber register and the subscriber abstraction. The
//! interception half, which decides *when* to track and notify, lives in
//! [`crate::observer`].
//!
//! # Concepts
//!
//! ## Dependency Sets
//!
//! A [`Dep`] belongs to one trackable unit (a record field, or a container
//! as a whole) and holds the subscribers that read it. Writing to the unit
//! notifies every one of them.
//!
//! ## Subscribers
//!
//! A [`Subscriber`] is whatever computation wants to know when the values it
//! read change. The engine ships two: [`Notifier`], a bare callback, and
//! [`Watcher`], which re-runs a function and keeps its dependency list
//! current across runs.
//!
//! ## The Active Subscriber
//!
//! While a subscriber evaluates, it sits on top of a per-thread stack (see
//! [`ReactiveContext`]). Reads of tracked units subscribe whatever is on top.
//! Nested evaluations push and pop, so an inner computation never steals an
//! outer one's dependencies.

mod context;
mod dep;
mod subscriber;
mod watcher;

pub use context::{untracked, with_active_subscriber, ReactiveContext};
pub use dep::{Dep, DepId};
pub use subscriber::{Notifier, Subscriber, SubscriberId};
pub use watcher::Watcher;
