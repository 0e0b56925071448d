//! # Event Publisher
//!
//! The publishing side of the session event bus.

use crate::events::{EventFilter, SessionEvent};
use crate::subscriber::{EventStream, Subscription, SubscriptionTicket};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing session events.
///
/// Engines publish only after the new state is persisted, so a subscriber
/// that reacts to an event can always read the state that produced it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// Returns the number of active subscribers that received the event.
    async fn publish(&self, event: SessionEvent) -> usize;

    /// Total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` so every subscriber sees every event in
/// publication order. Cross-context delivery goes through the shared store,
/// not through this bus.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<SessionEvent>,

    /// Live subscriptions keyed by a description of their filter.
    subscriptions: Arc<Mutex<HashMap<String, usize>>>,

    events_published: AtomicU64,

    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the given per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = format!("{:?}/{:?}", filter.topics, filter.kinds);

        *self.subscriptions.lock().entry(key.clone()).or_insert(0) += 1;
        debug!(filter = %key, "New subscription created");

        let ticket = SubscriptionTicket::new(self.subscriptions.clone(), key);
        Subscription::new(receiver, filter, ticket)
    }

    /// Stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of live subscriptions sharing the given filter description.
    #[must_use]
    pub fn subscriptions_for(&self, filter: &EventFilter) -> usize {
        let key = format!("{:?}/{:?}", filter.topics, filter.kinds);
        self.subscriptions.lock().get(&key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: SessionEvent) -> usize {
        let kind = event.kind();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = %kind, receivers, "Event published");
                receivers
            }
            Err(_) => {
                // Nobody is watching this context; nothing to deliver.
                trace!(event = %kind, "Event published with no subscribers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventTopic};

    fn approved(name: &str) -> SessionEvent {
        SessionEvent::StudentApproved { name: name.into() }
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();

        let receivers = bus.publish(approved("Sam")).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe(EventFilter::all());

        let receivers = bus.publish(approved("Sam")).await;

        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryEventBus::new();

        let _sub1 = bus.subscribe(EventFilter::all());
        let _sub2 = bus.subscribe(EventFilter::all());
        let _sub3 = bus.subscribe(EventFilter::topics(vec![EventTopic::Chat]));

        // Filtering happens at the receiver, so all three count.
        let receivers = bus.publish(approved("Sam")).await;
        assert_eq!(receivers, 3);
        assert_eq!(bus.subscriptions_for(&EventFilter::all()), 2);
    }

    #[tokio::test]
    async fn test_subscription_tracking_released_on_drop() {
        let bus = InMemoryEventBus::new();
        let filter = EventFilter::kinds(vec![EventKind::Tick]);

        let sub = bus.subscribe(filter.clone());
        assert_eq!(bus.subscriptions_for(&filter), 1);

        drop(sub);
        assert_eq!(bus.subscriptions_for(&filter), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
    }
}
