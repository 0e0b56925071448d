//! # Context Bridge
//!
//! What a UI surface holds: submit commands, read snapshots, react to
//! events. It never touches the session directly.

use std::sync::Arc;

use cp_01_vote_tally::VotingProgress;
use cp_02_session_model::{PollPhase, Session};
use cp_03_sync_engine::EngineHandle;
use serde_json::Value;
use shared_bus::{EventFilter, EventKind, EventStream, Handler, SessionEvent, Subscription};
use shared_types::{ChatMessage, Command, ContextId, TallyReport};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::BridgeError;
use crate::listener::ListenerGuard;

/// Adapter between one context's UI and its sync engine.
#[derive(Clone, Debug)]
pub struct ContextBridge {
    engine: EngineHandle,
}

impl ContextBridge {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn context_id(&self) -> ContextId {
        self.engine.context_id()
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Queue a command for the engine.
    ///
    /// # Errors
    ///
    /// `BridgeError::EngineStopped` if the engine is gone.
    pub fn submit(&self, command: Command) -> Result<(), BridgeError> {
        debug!(command = command.name(), "Submitting command");
        self.engine.submit(command).map_err(BridgeError::from)
    }

    /// Build a command from its wire name and JSON payload.
    ///
    /// # Errors
    ///
    /// `UnknownCommand` for a name outside the command set,
    /// `MalformedPayload` when the payload does not fit the command.
    pub fn parse_command(name: &str, payload: Value) -> Result<Command, BridgeError> {
        if !Command::NAMES.contains(&name) {
            return Err(BridgeError::UnknownCommand(name.to_string()));
        }
        Command::from_named(name, payload).map_err(|source| BridgeError::MalformedPayload {
            command: name.to_string(),
            source,
        })
    }

    /// Submit a command given by name, as UI code does.
    ///
    /// Unknown or malformed commands are logged and dropped. Returns true if
    /// the command was queued.
    pub fn submit_named(&self, name: &str, payload: Value) -> bool {
        let queued = Self::parse_command(name, payload).and_then(|cmd| self.submit(cmd));
        match queued {
            Ok(()) => true,
            Err(e) => {
                warn!("[cp-04] Dropped command {}: {}", name, e);
                false
            }
        }
    }

    /// Wait until every command submitted so far has been applied.
    ///
    /// # Errors
    ///
    /// `BridgeError::EngineStopped` if the engine is gone.
    pub async fn flush(&self) -> Result<(), BridgeError> {
        self.engine.flush().await.map_err(BridgeError::from)
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Register `handler` for `kind`. Registering the same handler twice
    /// for the same kind has no effect and returns false.
    pub fn on(&self, kind: EventKind, handler: Handler) -> bool {
        self.engine.listeners().register(kind, handler)
    }

    /// Remove `handler` from `kind`. Returns false if it was not registered.
    pub fn off(&self, kind: EventKind, handler: &Handler) -> bool {
        self.engine.listeners().unregister(kind, handler)
    }

    /// [`on`](Self::on) with the event's wire name.
    ///
    /// # Errors
    ///
    /// `BridgeError::UnknownEvent` for a name outside the event set.
    pub fn on_named(&self, event: &str, handler: Handler) -> Result<bool, BridgeError> {
        Ok(self.on(parse_event(event)?, handler))
    }

    /// [`off`](Self::off) with the event's wire name.
    ///
    /// # Errors
    ///
    /// `BridgeError::UnknownEvent` for a name outside the event set.
    pub fn off_named(&self, event: &str, handler: &Handler) -> Result<bool, BridgeError> {
        Ok(self.off(parse_event(event)?, handler))
    }

    /// Register a closure for as long as the returned guard lives.
    pub fn listen<F>(&self, kind: EventKind, f: F) -> ListenerGuard
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(f);
        self.on(kind, handler.clone());
        ListenerGuard::new(self.engine.listeners().clone(), kind, handler)
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.engine.subscribe(filter)
    }

    pub fn events(&self, filter: EventFilter) -> EventStream {
        self.engine.events(filter)
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn snapshot(&self) -> Session {
        self.engine.snapshot()
    }

    /// Receiver that wakes whenever the session changes.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.engine.watch_snapshot()
    }

    pub fn tally(&self) -> TallyReport {
        self.engine.snapshot().tally()
    }

    pub fn progress(&self) -> VotingProgress {
        self.engine.snapshot().progress()
    }

    pub fn phase(&self) -> PollPhase {
        self.engine.snapshot().phase()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.engine.snapshot().chat().to_vec()
    }
}

fn parse_event(name: &str) -> Result<EventKind, BridgeError> {
    name.parse()
        .map_err(|_| BridgeError::UnknownEvent(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_03_sync_engine::{EngineConfig, InMemorySharedStore, SyncEngine};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    fn bridge() -> ContextBridge {
        let store = InMemorySharedStore::new();
        let (engine, _task) = SyncEngine::spawn(Arc::new(store), EngineConfig::default()).unwrap();
        ContextBridge::new(engine)
    }

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handler: Handler = Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (calls, handler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_named_applies_known_commands() {
        let bridge = bridge();

        assert!(bridge.submit_named("requestAdmission", json!({ "name": "Sam" })));
        assert!(bridge.submit_named("approve", json!({ "name": "Sam" })));
        bridge.flush().await.unwrap();

        assert!(bridge.snapshot().student("Sam").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_named_drops_bad_input() {
        let bridge = bridge();

        assert!(!bridge.submit_named("showResults", json!({})));
        assert!(!bridge.submit_named("approve", json!({ "who": "Sam" })));
        assert!(matches!(
            ContextBridge::parse_command("showResults", Value::Null),
            Err(BridgeError::UnknownCommand(_))
        ));
        assert!(matches!(
            ContextBridge::parse_command("createPoll", json!({ "question": 1 })),
            Err(BridgeError::MalformedPayload { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_is_idempotent_per_handler() {
        let bridge = bridge();
        let (calls, handler) = counter();

        assert!(bridge.on(EventKind::AdmissionRequested, handler.clone()));
        assert!(!bridge.on_named("admissionRequested", handler.clone()).unwrap());
        bridge.submit(Command::RequestAdmission { name: "Sam".into() }).unwrap();
        bridge.flush().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(bridge.off(EventKind::AdmissionRequested, &handler));
        assert!(!bridge.off(EventKind::AdmissionRequested, &handler));
        assert!(matches!(
            bridge.on_named("nope", handler),
            Err(BridgeError::UnknownEvent(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_guard_unregisters_on_drop() {
        let bridge = bridge();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let guard = bridge.listen(EventKind::MessagePosted, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let say = |text: &str| Command::SendMessage {
            author: "Teacher".into(),
            text: text.into(),
            is_presenter: true,
        };

        bridge.submit(say("hello")).unwrap();
        bridge.flush().await.unwrap();
        drop(guard);
        bridge.submit(say("again")).unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.chat_messages().len(), 2);
        assert!(bridge.engine().listeners().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_helpers_follow_the_poll() {
        let bridge = bridge();
        for name in ["Ann", "Ben"] {
            bridge.submit(Command::RequestAdmission { name: name.into() }).unwrap();
            bridge.submit(Command::Approve { name: name.into() }).unwrap();
        }
        bridge
            .submit(Command::CreatePoll {
                question: "2 + 2?".into(),
                options: vec!["4".into(), "5".into()],
                duration: 30,
            })
            .unwrap();
        bridge
            .submit(Command::SubmitVote {
                student_name: "Ann".into(),
                option: "4".into(),
            })
            .unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(bridge.phase(), PollPhase::Active);
        assert_eq!(bridge.tally().votes_for("4"), 1);
        let progress = bridge.progress();
        assert_eq!(progress.voted, 1);
        assert_eq!(progress.total, 2);
        assert!(!progress.is_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_stream_and_watch() {
        let bridge = bridge();
        let mut stream = bridge.events(EventFilter::kinds(vec![EventKind::StudentApproved]));
        let mut watch = bridge.watch();
        watch.borrow_and_update();

        bridge.submit(Command::RequestAdmission { name: "Sam".into() }).unwrap();
        bridge.submit(Command::Approve { name: "Sam".into() }).unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event, SessionEvent::StudentApproved { name: "Sam".into() });
        watch.changed().await.unwrap();
        assert!(watch.borrow().student("Sam").is_some());
    }
}
