//! Scoped logging facade.
//!
//! Output goes through the `tracing` ecosystem; the subscriber is the
//! binary's concern. The facade exists because the platform contract needs
//! two things spans do not give us directly: per-node sub-logger derivation
//! by name, and an enable switch the build driver flips off once a build
//! resolves.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named logger with an on/off switch.
///
/// Cloning shares the switch; [`Logger::sub_logger`] derives a child with
/// its own switch (initialized from the parent's current state).
#[derive(Clone, Debug)]
pub struct Logger {
    scope: String,
    enabled: Arc<AtomicBool>,
}

impl Logger {
    /// Create a root logger with an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scope("")
    }

    /// Create a logger with an explicit scope.
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The logger scope (e.g. a node path).
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Whether messages are currently emitted.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip the emit switch.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Derive a child logger scoped under this one.
    ///
    /// The child has its own switch, starting from the parent's current
    /// state.
    #[must_use]
    pub fn sub_logger(&self, scope: &str) -> Logger {
        let scope = if self.scope.is_empty() {
            scope.to_owned()
        } else {
            format!("{}/{}", self.scope, scope)
        };
        Self {
            scope,
            enabled: Arc::new(AtomicBool::new(self.is_enabled())),
        }
    }

    /// Emit an info-level message.
    pub fn log(&self, message: impl Display) {
        if self.is_enabled() {
            tracing::info!(scope = %self.scope, "{message}");
        }
    }

    /// Emit an action line, e.g. `[rebuild] bundles/page/page.js`.
    pub fn log_action(&self, action: &str, target: &str) {
        if self.is_enabled() {
            tracing::info!(scope = %self.scope, "[{action}] {target}");
        }
    }

    /// Emit a warning.
    pub fn warn(&self, message: impl Display) {
        if self.is_enabled() {
            tracing::warn!(scope = %self.scope, "{message}");
        }
    }

    /// Emit an error-level message.
    pub fn error(&self, message: impl Display) {
        if self.is_enabled() {
            tracing::error!(scope = %self.scope, "{message}");
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
