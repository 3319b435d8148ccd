//! Event Bus - pub/sub for polling engine events
//!
//! The EventBus uses a tokio broadcast channel. The coordinator emits, any
//! number of consumers (terminal output, tests) subscribe.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PollEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast channel for [`PollEvent`]s
///
/// Cheap to clone; every clone emits into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PollEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped, and a slow
    /// subscriber loses the oldest events.
    pub fn emit(&self, event: PollEvent) {
        debug!(event_type = event.event_type(), round = ?event.round(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
