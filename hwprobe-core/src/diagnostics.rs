//! Diagnostic output for the probing crates.
//!
//! Every component reports what it queried and what came back through the
//! macros in this module. A single process-wide switch turns the whole
//! stream off; when it is on, lines are forwarded to `tracing` so the
//! subscriber installed by `hwprobe-logging` decides where they end up.
//! The switch never changes what a probe returns.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn diagnostic output on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether diagnostic output is currently emitted.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

#[macro_export]
macro_rules! probe_trace {
    ($($arg:tt)*) => {
        if $crate::diagnostics::is_enabled() {
            $crate::tracing::trace!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! probe_debug {
    ($($arg:tt)*) => {
        if $crate::diagnostics::is_enabled() {
            $crate::tracing::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! probe_warn {
    ($($arg:tt)*) => {
        if $crate::diagnostics::is_enabled() {
            $crate::tracing::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! probe_error {
    ($($arg:tt)*) => {
        if $crate::diagnostics::is_enabled() {
            $crate::tracing::error!($($arg)*);
        }
    };
}
