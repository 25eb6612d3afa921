//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently reading.
//! When a tracked field is read, the field's dependency set subscribes
//! whatever subscriber sits on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack. When a collaborator evaluates a reactive
//! computation it pushes its subscriber; when the computation completes the
//! guard pops it, restoring the previous one. This supports nested
//! evaluations (a consumer reading inside another consumer's evaluation),
//! and keeps two threads from ever seeing each other's active subscriber.
//!
//! An entry may also be empty: [`untracked`] pushes one so that reads inside
//! it do not subscribe anything.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Arc<dyn Subscriber>>>> = RefCell::new(Vec::new());
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any tracked read subscribes it.
    /// The context is exited when the returned guard is dropped.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(subscriber)));
        Self { subscriber_id }
    }

    /// Enter a context in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a subscriber is currently reading.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Get the current subscriber's ID, if any.
    pub fn current_subscriber_id() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.as_ref().map(|sub| sub.id()))
        })
    }

    /// Depth of the context stack, including untracked entries.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Catch guards dropped out of order.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.as_ref().map(|sub| sub.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` with `subscriber` as the active subscriber, restoring the
/// previous one afterwards.
pub fn with_active_subscriber<R>(subscriber: Arc<dyn Subscriber>, f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter(subscriber);
    f()
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
