//! Event fan-out to connected subscribers
//!
//! Each subscriber owns a bounded channel. Broadcast tries every subscriber
//! once, in registration order; a closed channel marks the subscriber for
//! pruning after the pass, a full channel only drops the event for that
//! subscriber. There is no retry or replay.

use crate::ingest::DomainEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Envelope delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

/// Opaque handle identifying one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// A subscriber's end of the bus
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<BusMessage>,
}

struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriberId, mpsc::Sender<BusMessage>)>,
}

/// Broadcasts domain events to every registered subscriber
pub struct EventBus {
    buffer: usize,
    subscribers: Mutex<Subscribers>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    /// A panic elsewhere while holding the lock leaves the list itself intact
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber (called when a consumer connects)
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut guard = self.lock();

        let id = SubscriberId(guard.next_id);
        guard.next_id += 1;
        guard.entries.push((id, tx));

        tracing::debug!("Subscriber {:?} connected ({} total)", id, guard.entries.len());
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber (called when a consumer disconnects)
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut guard = self.lock();
        let before = guard.entries.len();
        guard.entries.retain(|(sid, _)| *sid != id);
        before != guard.entries.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.lock().entries.iter().any(|(sid, _)| *sid == id)
    }

    /// Deliver one message to every subscriber, returning how many accepted it
    pub fn broadcast(&self, event_type: &str, data: Value) -> usize {
        let message = BusMessage {
            event_type: event_type.to_string(),
            data,
        };

        let mut guard = self.lock();

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, tx) in &guard.entries {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Subscriber {:?} is lagging, dropped {}", id, event_type);
                }
                Err(TrySendError::Closed(_)) => dead.push(*id),
            }
        }

        if !dead.is_empty() {
            guard.entries.retain(|(id, _)| !dead.contains(id));
            tracing::debug!("Pruned {} disconnected subscriber(s)", dead.len());
        }

        delivered
    }

    /// Broadcast a domain event under its own event type
    pub fn publish(&self, event: &DomainEvent) -> usize {
        match serde_json::to_value(event) {
            Ok(data) => self.broadcast(event.event_type(), data),
            Err(e) => {
                tracing::warn!("Failed to serialize {} event: {}", event.event_type(), e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serializes_as_type_and_data() {
        let message = BusMessage {
            event_type: "session_start".to_string(),
            data: json!({"session_id": "s1"}),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "session_start", "data": {"session_id": "s1"}})
        );
    }

    #[test]
    fn test_full_subscriber_is_kept() {
        let bus = EventBus::new(1);
        let sub = bus.subscribe();
        assert_eq!(bus.broadcast("a", json!(1)), 1);
        // Second message does not fit; subscriber stays registered
        assert_eq!(bus.broadcast("b", json!(2)), 0);
        assert!(bus.is_subscribed(sub.id));
    }

    #[test]
    fn test_unsubscribe_unknown_is_false() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        assert!(bus.unsubscribe(sub.id));
        assert!(!bus.unsubscribe(sub.id));
    }

    #[test]
    fn test_poisoned_lock_keeps_subscribers_visible() {
        let bus = EventBus::default();
        let sub = bus.subscribe();

        let result = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = bus.subscribers.lock().unwrap();
                    panic!("subscriber list poisoned");
                })
                .join()
        });
        assert!(result.is_err());
        assert!(bus.subscribers.is_poisoned());

        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.is_subscribed(sub.id));
        assert_eq!(bus.broadcast("a", json!(1)), 1);
    }
}
