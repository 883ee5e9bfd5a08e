//! Single-topic, single-subscriber event relay.
//!
//! The relay decouples ingress (running on the push source's thread) from
//! delivery. It holds at most one subscriber in a mutex-protected slot:
//! subscribing replaces the previous handler, and publishing with an empty
//! slot drops the event. Nothing is buffered for a later subscriber.
//!
//! `publish` hands the event to the handler while holding the slot lock, so a
//! publish racing a swap reaches exactly one of the old or new handler, and
//! events reach the subscriber in publish order. Handlers must therefore be
//! non-blocking and must not call back into the relay.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use pushbridge_core::NotificationEvent;

use crate::telemetry::{self, EventOutcome};

/// Callback invoked for each published event.
pub type EventHandler = Box<dyn FnMut(NotificationEvent) + Send>;

/// Identifies one registration. Only the handle of the current subscriber
/// can clear the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
}

impl SubscriptionHandle {
    pub const fn id(self) -> u64 {
        self.id
    }
}

/// Result of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    /// No subscriber was registered.
    Dropped,
}

struct Slot {
    handle: SubscriptionHandle,
    handler: EventHandler,
}

/// In-process publish/subscribe channel with one subscriber slot.
pub struct EventRelay {
    slot: Mutex<Option<Slot>>,
    next_id: AtomicU64,
}

impl EventRelay {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Publish an event to the current subscriber, if any.
    pub fn publish(&self, event: NotificationEvent) -> PublishOutcome {
        telemetry::record_event(EventOutcome::Published);
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(current) => {
                debug!(
                    event_id = %event.id(),
                    subscription = current.handle.id,
                    "Delivering event to subscriber"
                );
                (current.handler)(event);
                PublishOutcome::Delivered
            }
            None => {
                drop(slot);
                debug!(event_id = %event.id(), "No active subscriber, event dropped");
                telemetry::record_event(EventOutcome::Dropped);
                PublishOutcome::Dropped
            }
        }
    }

    /// Register `handler` as the only subscriber, replacing any previous one.
    pub fn subscribe(&self, handler: EventHandler) -> SubscriptionHandle {
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let previous = self.slot.lock().replace(Slot { handle, handler });

        match previous {
            Some(old) => info!(
                subscription = handle.id,
                replaced = old.handle.id,
                "Subscriber replaced"
            ),
            None => info!(subscription = handle.id, "Subscriber registered"),
        }
        handle
    }

    /// Remove the subscriber registered under `handle`.
    ///
    /// Idempotent: a stale or unknown handle is a no-op. Returns whether a
    /// subscriber was removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = {
            let mut slot = self.slot.lock();
            if slot.as_ref().is_some_and(|s| s.handle == handle) {
                slot.take()
            } else {
                None
            }
        };

        if removed.is_some() {
            info!(subscription = handle.id, "Subscriber unregistered");
            true
        } else {
            debug!(subscription = handle.id, "Unsubscribe of inactive handle ignored");
            false
        }
    }

    /// Whether a subscriber is currently registered.
    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::mpsc;

    use super::*;

    fn event(id: &str) -> NotificationEvent {
        NotificationEvent::new(id, "", "", HashMap::new(), 0).unwrap()
    }

    fn channel_handler() -> (EventHandler, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel();
        let handler: EventHandler = Box::new(move |e| {
            let _ = tx.send(e);
        });
        (handler, rx)
    }

    #[test]
    fn publish_without_subscriber_drops() {
        let relay = EventRelay::new();
        assert_eq!(relay.publish(event("e1")), PublishOutcome::Dropped);
        assert!(!relay.is_active());
    }

    #[test]
    fn dropped_event_is_not_replayed_to_later_subscriber() {
        let relay = EventRelay::new();
        relay.publish(event("early"));

        let (handler, rx) = channel_handler();
        relay.subscribe(handler);
        assert!(rx.try_recv().is_err());

        relay.publish(event("late"));
        assert_eq!(rx.try_recv().unwrap().id(), "late");
    }

    #[test]
    fn delivers_in_publish_order() {
        let relay = EventRelay::new();
        let (handler, rx) = channel_handler();
        relay.subscribe(handler);

        relay.publish(event("e1"));
        relay.publish(event("e2"));

        assert_eq!(rx.try_recv().unwrap().id(), "e1");
        assert_eq!(rx.try_recv().unwrap().id(), "e2");
    }

    #[test]
    fn subscribe_replaces_previous_handler() {
        let relay = EventRelay::new();
        let (first, first_rx) = channel_handler();
        let (second, second_rx) = channel_handler();

        relay.subscribe(first);
        relay.subscribe(second);
        assert_eq!(relay.publish(event("e1")), PublishOutcome::Delivered);

        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap().id(), "e1");
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let relay = EventRelay::new();
        let (handler, _rx) = channel_handler();
        let handle = relay.subscribe(handler);

        assert!(relay.unsubscribe(handle));
        assert!(!relay.unsubscribe(handle));
        assert!(!relay.is_active());
    }

    #[test]
    fn stale_handle_does_not_remove_newer_subscriber() {
        let relay = EventRelay::new();
        let (first, _first_rx) = channel_handler();
        let (second, second_rx) = channel_handler();

        let stale = relay.subscribe(first);
        let current = relay.subscribe(second);
        assert_ne!(stale, current);

        assert!(!relay.unsubscribe(stale));
        assert!(relay.is_active());
        relay.publish(event("e1"));
        assert_eq!(second_rx.try_recv().unwrap().id(), "e1");
    }

    #[test]
    fn no_delivery_after_unsubscribe() {
        let relay = EventRelay::new();
        let (handler, rx) = channel_handler();
        let handle = relay.subscribe(handler);
        relay.unsubscribe(handle);

        assert_eq!(relay.publish(event("e1")), PublishOutcome::Dropped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn concurrent_publish_and_swap_deliver_each_event_exactly_once() {
        let relay = Arc::new(EventRelay::new());
        let (tx, rx) = mpsc::channel::<String>();

        let make_handler = |tx: mpsc::Sender<String>| -> EventHandler {
            Box::new(move |e| {
                let _ = tx.send(e.id().to_string());
            })
        };
        relay.subscribe(make_handler(tx.clone()));

        let publisher = {
            let relay = Arc::clone(&relay);
            std::thread::spawn(move || {
                for i in 0..500 {
                    assert_eq!(
                        relay.publish(event(&format!("e{i}"))),
                        PublishOutcome::Delivered
                    );
                }
            })
        };
        for _ in 0..100 {
            relay.subscribe(make_handler(tx.clone()));
        }
        publisher.join().unwrap();
        drop(tx);
        relay.subscribe(Box::new(|_| {}));

        let received: Vec<String> = rx.iter().collect();
        let expected: Vec<String> = (0..500).map(|i| format!("e{i}")).collect();
        assert_eq!(received, expected);
    }
}
