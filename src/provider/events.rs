// Session change event fan-out
// Per-subscriber unbounded channels; order-preserving, never dropping

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;

use crate::auth::types::AuthEvent;

type Subscribers = Arc<DashMap<u64, mpsc::UnboundedSender<AuthEvent>>>;

/// Fan-out point for provider session change events.
///
/// Each subscriber gets its own unbounded queue, so a slow consumer sees
/// every event in emission order rather than a coalesced latest value.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Subscribers,
    next_id: Arc<AtomicU64>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> EventStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        EventStream {
            rx,
            _guard: Unsubscribe {
                id,
                subscribers: Arc::clone(&self.subscribers),
            },
        }
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: AuthEvent) {
        for entry in self.subscribers.iter() {
            // A closed channel means the stream is mid-drop; its guard
            // removes the entry.
            let _ = entry.value().send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Cancellation handle; deregisters the subscriber on drop.
struct Unsubscribe {
    id: u64,
    subscribers: Subscribers,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.subscribers.remove(&self.id);
    }
}

/// Ordered stream of [`AuthEvent`]s for one subscriber.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<AuthEvent>,
    _guard: Unsubscribe,
}

impl EventStream {
    /// Next event, or `None` once the stream is exhausted.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = AuthEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::Identity;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "u1@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_delivered_in_emission_order() {
        let hub = EventHub::new();
        let mut stream = hub.subscribe();

        let identity = identity();
        hub.emit(AuthEvent::SignedIn(identity.clone()));
        hub.emit(AuthEvent::SignedOut);
        hub.emit(AuthEvent::SignedIn(identity.clone()));

        assert_eq!(stream.recv().await, Some(AuthEvent::SignedIn(identity.clone())));
        assert_eq!(stream.recv().await, Some(AuthEvent::SignedOut));
        assert_eq!(stream.recv().await, Some(AuthEvent::SignedIn(identity)));
    }

    #[tokio::test]
    async fn test_each_subscriber_sees_every_event() {
        let hub = EventHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.emit(AuthEvent::SignedOut);

        assert_eq!(first.recv().await, Some(AuthEvent::SignedOut));
        assert_eq!(second.recv().await, Some(AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_drop_deregisters_subscriber() {
        let hub = EventHub::new();
        let stream = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);

        // Emitting with no subscribers is a no-op, not an error
        hub.emit(AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_events_queue_while_subscriber_is_busy() {
        let hub = EventHub::new();
        let mut stream = hub.subscribe();

        for _ in 0..3 {
            hub.emit(AuthEvent::SignedOut);
        }

        // Nothing coalesced: all three are still there
        for _ in 0..3 {
            assert_eq!(stream.recv().await, Some(AuthEvent::SignedOut));
        }
    }
}
