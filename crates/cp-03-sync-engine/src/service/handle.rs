//! Client side of an engine.

use std::sync::Arc;

use cp_02_session_model::Session;
use shared_bus::{EventFilter, EventStream, InMemoryEventBus, ListenerRegistry, Subscription};
use shared_types::{Command, ContextId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use super::engine::EngineMessage;
use crate::config::ConfigError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine task has exited.
    #[error("sync engine has stopped")]
    Stopped,

    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Cheap, cloneable access to one running engine.
///
/// The engine runs for as long as at least one handle exists.
#[derive(Clone)]
pub struct EngineHandle {
    context_id: ContextId,
    mailbox: mpsc::UnboundedSender<EngineMessage>,
    snapshot: watch::Receiver<Session>,
    bus: Arc<InMemoryEventBus>,
    listeners: Arc<ListenerRegistry>,
}

impl EngineHandle {
    pub(crate) fn new(
        context_id: ContextId,
        mailbox: mpsc::UnboundedSender<EngineMessage>,
        snapshot: watch::Receiver<Session>,
        bus: Arc<InMemoryEventBus>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            context_id,
            mailbox,
            snapshot,
            bus,
            listeners,
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Queue a command. Commands from one handle are applied in order.
    ///
    /// Success means the command was queued, not that it was accepted;
    /// invalid commands are dropped by the engine.
    ///
    /// # Errors
    ///
    /// `EngineError::Stopped` if the engine is gone.
    pub fn submit(&self, command: Command) -> Result<(), EngineError> {
        self.send(EngineMessage::Submit(command))
    }

    /// Ask for a full resync from the shared store.
    ///
    /// # Errors
    ///
    /// `EngineError::Stopped` if the engine is gone.
    pub fn resync(&self) -> Result<(), EngineError> {
        self.send(EngineMessage::Resync)
    }

    /// Wait until everything queued before this call has been processed.
    ///
    /// # Errors
    ///
    /// `EngineError::Stopped` if the engine is gone.
    pub async fn flush(&self) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::Flush(tx))?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Stop the engine after the messages already queued.
    pub fn shutdown(&self) {
        let _ = self.send(EngineMessage::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified whenever the session changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<Session> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    pub fn events(&self, filter: EventFilter) -> EventStream {
        self.bus.event_stream(filter)
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.mailbox
            .send(message)
            .map_err(|_| EngineError::Stopped)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("context_id", &self.context_id)
            .field("running", &self.is_running())
            .finish()
    }
}
