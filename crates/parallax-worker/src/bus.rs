//! In-process event bus.
//!
//! Fans orchestrator notifications out to interactive subscribers. Sending
//! never blocks and never fails: with no subscribers the event is dropped,
//! and a lagging subscriber loses old events rather than slowing publishers.

use std::fmt;
use tokio::sync::broadcast;

use parallax_core::events::BusEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    capacity: usize,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BusEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::events::{ModelResidency, ModelStatusEvent, QueueUpdateEvent};

    fn status_event(key: &str) -> BusEvent {
        BusEvent::ModelStatus(ModelStatusEvent {
            status: ModelResidency::Loaded,
            model_key: Some(key.to_string()),
            loaded_at: None,
        })
    }

    #[tokio::test]
    async fn fan_out_preserves_publish_order() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(status_event("small"));
        bus.publish(BusEvent::QueueUpdate(QueueUpdateEvent {
            length: 3,
            current: None,
            processing: true,
        }));

        for rx in [&mut a, &mut b] {
            let first = rx.recv().await.unwrap();
            assert_eq!(first.channel(), "model:status");
            let second = rx.recv().await.unwrap();
            assert_eq!(second.channel(), "queue:update");
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(status_event("small"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(status_event(&format!("m{}", i)));
        }

        // The receiver lost the oldest events but the publisher never stalled.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed > 0),
            other => panic!("expected lag, got {:?}", other),
        }
    }
}
