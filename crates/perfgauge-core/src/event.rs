//! Broadcast event bus shared by every engine component.
//!
//! Each component owns its own bus; callers subscribe for a receiver and
//! consume events at their own pace. Emission is lossy by design: an event
//! with no subscribers is simply dropped, and slow subscribers see
//! `Lagged` from the broadcast channel rather than backpressuring the
//! emitting component.

use tokio::sync::broadcast;

/// Default buffered capacity per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Clone-based fan-out bus over `tokio::sync::broadcast`.
#[derive(Debug)]
pub struct EventBus<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open a new subscription; events emitted before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers, dropping it when there are
    /// none.
    pub fn emit(&self, event: T) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
