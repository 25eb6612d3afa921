//! Runtime settings.
//!
//! Three switches influence the engine:
//!
//! - `observing`: whether newly encountered containers get wrapped at all.
//!   Collaborators turn it off during bulk internal assignment where
//!   wrapping would be wasted work.
//! - `server_rendering`: the non-mutating simulation context. While set,
//!   only containers wrapped in mock mode are tracked.
//! - `strict`: escalate misuse diagnostics from warnings to errors.
//!
//! Like the active-subscriber register, settings live per thread, so two
//! evaluation contexts on different threads never see each other's state.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// A snapshot of the per-thread settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub observing: bool,
    pub server_rendering: bool,
    pub strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            observing: true,
            server_rendering: false,
            strict: false,
        }
    }
}

thread_local! {
    static SETTINGS: Cell<Settings> = Cell::new(Settings::default());
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The settings currently in effect on this thread.
    pub fn current() -> Self {
        SETTINGS.with(Cell::get)
    }

    /// Install these settings on this thread, returning the previous ones.
    pub fn apply(self) -> Settings {
        SETTINGS.with(|cell| cell.replace(self))
    }
}

fn update(f: impl FnOnce(&mut Settings)) {
    SETTINGS.with(|cell| {
        let mut settings = cell.get();
        f(&mut settings);
        cell.set(settings);
    });
}

/// Enable or disable wrapping of newly observed values.
pub fn toggle_observing(enabled: bool) {
    update(|s| s.observing = enabled);
}

/// Whether newly observed values are wrapped.
pub fn should_observe() -> bool {
    Settings::current().observing
}

/// Run `f` with observing disabled, restoring the previous state after.
pub fn without_observing<R>(f: impl FnOnce() -> R) -> R {
    let previous = should_observe();
    let _restore = ObservingGuard { previous };
    toggle_observing(false);
    f()
}

/// Restores the observing toggle when dropped, even if the closure panics.
struct ObservingGuard {
    previous: bool,
}

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        toggle_observing(self.previous);
    }
}

/// Enter or leave the non-mutating simulation context.
pub fn set_server_rendering(enabled: bool) {
    update(|s| s.server_rendering = enabled);
}

pub fn is_server_rendering() -> bool {
    Settings::current().server_rendering
}

/// Escalate diagnostics to errors.
pub fn set_strict(enabled: bool) {
    update(|s| s.strict = enabled);
}

pub fn is_strict() -> bool {
    Settings::current().strict
}
