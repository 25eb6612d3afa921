//! Error types and the diagnostic channel.
//!
//! Misuse of the structural helpers is never fatal by default: it is reported
//! as a `tracing` warning and the operation degrades to a no-op or a plain,
//! untracked mutation. With strict mode on (see [`crate::config`]) the same
//! conditions are returned as errors instead.

use thiserror::Error;
use tracing::warn;

use crate::config;
use crate::reactive::SubscriberId;

/// Boxed error returned by a failing subscriber.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber that failed during a notify pass.
#[derive(Debug)]
pub struct SubscriberFailure {
    pub subscriber: SubscriberId,
    pub source: BoxError,
}

/// All subscriber failures collected from one notify pass.
#[derive(Debug, Error)]
#[error("{} subscriber(s) failed during notification", .failures.len())]
pub struct NotifyError {
    pub failures: Vec<SubscriberFailure>,
}

/// Errors produced by tracked containers and the structural helpers.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("cannot {op} reactive property on undefined, null, or primitive value")]
    InvalidTarget { op: &'static str },

    #[error("cannot {op} key \"{key}\" on a list: not a valid index")]
    InvalidIndex { op: &'static str, key: String },

    #[error("{op} operation on key \"{key}\" failed: target is readonly")]
    Readonly { op: &'static str, key: String },

    #[error(
        "avoid {op} reactive property \"{key}\" on a root state container at runtime; declare it upfront"
    )]
    RootMutation { op: &'static str, key: String },

    #[error("cannot {op} a list at its integrity level")]
    Frozen { op: &'static str },

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Surface a diagnostic.
///
/// Returns `Ok(())` after logging in normal mode so the caller can carry on
/// with its fallback, or the error itself in strict mode.
pub(crate) fn report(err: ObserveError) -> Result<(), ObserveError> {
    if config::is_strict() {
        return Err(err);
    }
    warn!(error = %err, "reactive misuse");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_degrades_outside_strict_mode() {
        config::set_strict(false);
        assert!(report(ObserveError::InvalidTarget { op: "set" }).is_ok());
    }

    #[test]
    fn report_escalates_in_strict_mode() {
        config::set_strict(true);
        let err = report(ObserveError::RootMutation {
            op: "adding",
            key: "extra".into(),
        })
        .unwrap_err();
        config::set_strict(false);

        assert!(matches!(err, ObserveError::RootMutation { .. }));
        assert!(err.to_string().contains("\"extra\""));
    }

    #[test]
    fn notify_error_counts_failures() {
        let err = NotifyError {
            failures: vec![SubscriberFailure {
                subscriber: SubscriberId::new(),
                source: "boom".into(),
            }],
        };
        assert_eq!(err.to_string(), "1 subscriber(s) failed during notification");
    }
}
