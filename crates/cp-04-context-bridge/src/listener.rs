//! Scoped listener registration.

use std::sync::Arc;

use shared_bus::{EventKind, Handler, ListenerRegistry};

/// Keeps a listener registered until dropped.
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct ListenerGuard {
    registry: Arc<ListenerRegistry>,
    kind: EventKind,
    handler: Handler,
}

impl ListenerGuard {
    pub(crate) fn new(registry: Arc<ListenerRegistry>, kind: EventKind, handler: Handler) -> Self {
        Self {
            registry,
            kind,
            handler,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.kind, &self.handler);
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
