//! # Event Publisher
//!
//! Fan-out of decoded events and connection lifecycle events.
//!
//! Data events and lifecycle events travel on two separate broadcast
//! channels so consumers subscribe only to what they need. A subscriber that
//! falls more than the channel capacity behind loses the oldest events
//! (`RecvError::Lagged`); the reader never waits on subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::InputEventError;
use crate::event::{DecodedEvent, EventCategory};

/// Default capacity of each broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Connection lifecycle notifications
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Device node opened; reading has started
    Opened { device: String },
    /// Read failure or undecodable sample
    Error {
        device: String,
        error: Arc<InputEventError>,
    },
}

impl LifecycleEvent {
    /// Event name, `"opened"` or `"error"`
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Opened { .. } => "opened",
            LifecycleEvent::Error { .. } => "error",
        }
    }

    /// Device identifier this event concerns
    pub fn device(&self) -> &str {
        match self {
            LifecycleEvent::Opened { device } | LifecycleEvent::Error { device, .. } => device,
        }
    }
}

/// Sending side of the two event streams
#[derive(Debug, Clone)]
pub struct EventPublisher {
    events: broadcast::Sender<DecodedEvent>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
}

impl EventPublisher {
    /// Create both channels with the given capacity
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        Self { events, lifecycle }
    }

    /// Publish a decoded event
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish_event(&self, event: DecodedEvent) -> usize {
        match self.events.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!("No subscribers for {} event", event.category);
                0
            }
        }
    }

    /// Publish `opened`
    pub fn publish_opened(&self, device: &str) {
        self.publish_lifecycle(LifecycleEvent::Opened {
            device: device.to_string(),
        });
    }

    /// Publish `error`
    pub fn publish_error(&self, device: &str, error: InputEventError) {
        self.publish_lifecycle(LifecycleEvent::Error {
            device: device.to_string(),
            error: Arc::new(error),
        });
    }

    fn publish_lifecycle(&self, event: LifecycleEvent) {
        if self.lifecycle.send(event).is_err() {
            trace!("No lifecycle subscribers");
        }
    }

    /// Subscribe to all decoded events
    pub fn subscribe(&self) -> broadcast::Receiver<DecodedEvent> {
        self.events.subscribe()
    }

    /// Subscribe to decoded events of one category
    pub fn subscribe_category(&self, category: EventCategory) -> CategoryReceiver {
        CategoryReceiver {
            category,
            receiver: self.events.subscribe(),
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Receiver filtered to a single [`EventCategory`]
#[derive(Debug)]
pub struct CategoryReceiver {
    category: EventCategory,
    receiver: broadcast::Receiver<DecodedEvent>,
}

impl CategoryReceiver {
    /// Category this receiver yields
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Wait for the next event of this category
    ///
    /// # Errors
    ///
    /// Same as [`broadcast::Receiver::recv`]: `Closed` once the connection is
    /// gone, `Lagged` if events were dropped.
    pub async fn recv(&mut self) -> Result<DecodedEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if event.category == self.category {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeTables;
    use crate::event::decoder::encode_sample;
    use crate::event::protocol::{EV_KEY, EV_REL, EV_SYN};
    use crate::event::{EventDecoder, EventLayout};

    fn event(event_type: u16, code: u16, value: i32) -> DecodedEvent {
        let decoder = EventDecoder::new(EventLayout::Wide, CodeTables::shared());
        let sample = encode_sample(EventLayout::Wide, 0, 0, event_type, code, value);
        decoder.decode(&sample).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised_to_one() {
        let publisher = EventPublisher::new(0);
        let mut events = publisher.subscribe();
        let mut lifecycle = publisher.subscribe_lifecycle();

        assert_eq!(publisher.publish_event(event(EV_KEY, 30, 1)), 1);
        publisher.publish_opened("event0");

        assert_eq!(events.recv().await.unwrap().raw_code, 30);
        assert_eq!(lifecycle.recv().await.unwrap().name(), "opened");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.publish_event(event(EV_SYN, 0, 0)), 0);
        publisher.publish_opened("event0");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = EventPublisher::default();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        assert_eq!(publisher.publish_event(event(EV_KEY, 30, 1)), 2);

        assert_eq!(first.recv().await.unwrap().symbolic_name, Some("KEY_A"));
        assert_eq!(second.recv().await.unwrap().symbolic_name, Some("KEY_A"));
    }

    #[tokio::test]
    async fn test_category_receiver_filters() {
        let publisher = EventPublisher::default();
        let mut rel = publisher.subscribe_category(EventCategory::Rel);
        assert_eq!(rel.category(), EventCategory::Rel);

        publisher.publish_event(event(EV_KEY, 30, 1));
        publisher.publish_event(event(EV_SYN, 0, 0));
        publisher.publish_event(event(EV_REL, 0x01, 4));

        let received = rel.recv().await.unwrap();
        assert_eq!(received.category, EventCategory::Rel);
        assert_eq!(received.symbolic_name, Some("REL_Y"));
    }

    #[tokio::test]
    async fn test_lifecycle_stream_is_separate() {
        let publisher = EventPublisher::default();
        let mut events = publisher.subscribe();
        let mut lifecycle = publisher.subscribe_lifecycle();

        publisher.publish_opened("event3");
        publisher.publish_error("event3", InputEventError::InvalidKeyValue { value: 9 });

        let opened = lifecycle.recv().await.unwrap();
        assert_eq!(opened.name(), "opened");
        assert_eq!(opened.device(), "event3");

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Error { device, error } => {
                assert_eq!(device, "event3");
                assert!(matches!(*error, InputEventError::InvalidKeyValue { value: 9 }));
            }
            other => panic!("Expected error event, got: {:?}", other),
        }

        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
