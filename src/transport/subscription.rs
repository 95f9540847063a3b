//! Fan-out event subscriptions with RAII unregistration.
//!
//! [`Subscribers`] delivers each published value to every live
//! [`EventStream`]. Dropping a stream unregisters it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

type Registry<T> = Mutex<FxHashMap<SubscriptionId, mpsc::UnboundedSender<T>>>;

// ============================================================================
// Subscribers
// ============================================================================

/// Registry of event subscribers.
pub struct Subscribers<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone> Subscribers<T> {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> EventStream<T> {
        let id = SubscriptionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.lock().insert(id, tx);

        trace!(%id, "Subscriber registered");

        EventStream {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `value` to every live subscriber.
    ///
    /// Subscribers whose receiving side is gone are pruned.
    pub fn publish(&self, value: T) {
        self.registry
            .lock()
            .retain(|_, tx| tx.send(value.clone()).is_ok());
    }

    /// Returns the number of registered subscribers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns `true` if nobody is subscribed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Receiving half of a subscription. Unregisters on drop.
pub struct EventStream<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Weak<Registry<T>>,
}

impl<T> EventStream<T> {
    /// Returns the subscription ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.id);
            trace!(id = %self.id, "Subscriber removed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let subscribers = Subscribers::new();
        let mut first = subscribers.subscribe();
        let mut second = subscribers.subscribe();

        subscribers.publish(7_u32);

        assert_eq!(first.recv().await, Some(7));
        assert_eq!(second.recv().await, Some(7));
    }

    #[test]
    fn test_drop_unregisters() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let stream = subscribers.subscribe();
        assert_eq!(subscribers.len(), 1);

        drop(stream);
        assert!(subscribers.is_empty());
    }

    #[tokio::test]
    async fn test_stream_ends_with_publisher() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let mut stream = subscribers.subscribe();
        drop(subscribers);

        assert_eq!(stream.recv().await, None);
    }
}
