//! # Listener Registry
//!
//! Named callbacks keyed by event kind. A handler registered twice for the
//! same kind is kept once; unregistering a handler that was never registered
//! is a no-op.

use crate::events::{EventKind, SessionEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A registered callback.
pub type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Per-context table of event listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// Returns false if that exact handler was already registered.
    pub fn register(&self, kind: EventKind, handler: Handler) -> bool {
        let mut handlers = self.handlers.write();
        let entry = handlers.entry(kind).or_default();
        if entry.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        entry.push(handler);
        trace!(event = %kind, "Listener registered");
        true
    }

    /// Remove `handler` from `kind`.
    ///
    /// Returns false if it was not registered.
    pub fn unregister(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write();
        let Some(entry) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|h| !same_handler(h, handler));
        let removed = entry.len() != before;
        if entry.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Handlers run outside the lock, so a handler may register or
    /// unregister listeners.
    pub fn dispatch(&self, event: &SessionEvent) -> usize {
        let targets: Vec<Handler> = self
            .handlers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Total handlers across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
