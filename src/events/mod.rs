//! Outbound notification bus
//!
//! The coordinator publishes every state change here. Rendering and
//! transport adapters subscribe and filter by topic; nothing waits for
//! acknowledgment.

pub mod types;

pub use types::CoordinatorEvent;

use tokio::sync::broadcast;

/// Default event channel capacity (ring buffer size)
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

pub struct EventBus {
    tx: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: CoordinatorEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events
    ///
    /// A subscriber that falls behind by more than the capacity receives
    /// `Lagged` and misses events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::TileId;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(CoordinatorEvent::TileReleased {
            tile: TileId::remote(1),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, CoordinatorEvent::TileReleased { .. }));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::with_capacity(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(CoordinatorEvent::ReadyToConnect);

        assert!(matches!(rx1.recv().await.unwrap(), CoordinatorEvent::ReadyToConnect));
        assert!(matches!(rx2.recv().await.unwrap(), CoordinatorEvent::ReadyToConnect));
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(CoordinatorEvent::ReadyToConnect);
    }
}
