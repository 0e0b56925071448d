//! Shared fixtures for the integration tests.

use std::sync::Arc;

use cp_03_sync_engine::{EngineConfig, InMemorySharedStore, SyncEngine};
use cp_04_context_bridge::ContextBridge;
use shared_bus::{SessionEvent, Subscription};
use shared_types::Command;

/// Start a context on `store` with default settings.
pub fn context(store: &InMemorySharedStore) -> ContextBridge {
    context_with(store, EngineConfig::default())
}

pub fn context_with(store: &InMemorySharedStore, config: EngineConfig) -> ContextBridge {
    let (engine, _task) = SyncEngine::spawn(Arc::new(store.clone()), config).unwrap();
    ContextBridge::new(engine)
}

/// Request admission and approve it.
pub async fn admit(bridge: &ContextBridge, name: &str) {
    bridge
        .submit(Command::RequestAdmission { name: name.into() })
        .unwrap();
    bridge.submit(Command::Approve { name: name.into() }).unwrap();
    bridge.flush().await.unwrap();
}

pub fn poll(question: &str, options: &[&str], duration: u32) -> Command {
    Command::CreatePoll {
        question: question.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        duration,
    }
}

pub fn vote(name: &str, option: &str) -> Command {
    Command::SubmitVote {
        student_name: name.into(),
        option: option.into(),
    }
}

/// Flush every context once, in order.
pub async fn settle(contexts: &[&ContextBridge]) {
    for bridge in contexts {
        bridge.flush().await.unwrap();
    }
}

/// Everything already on the subscription.
pub fn drain(sub: &mut Subscription) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = sub.try_recv() {
        events.push(event);
    }
    events
}
