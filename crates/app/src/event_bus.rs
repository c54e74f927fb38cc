//! Fan-out of rule events to live stream clients.
//!
//! Backed by a bounded [`broadcast`] channel: every subscriber sees events
//! raised after it subscribed, and a subscriber that falls more than
//! `capacity` events behind loses the oldest ones (`RecvError::Lagged`).

use std::future::Future;

use tokio::sync::broadcast;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::event::Event;

use crate::ports::EventPublisher;

pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of currently connected stream clients.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        let event_type = event.event_type;
        match self.sender.send(event) {
            Ok(delivered) => tracing::trace!(%event_type, delivered, "event published"),
            Err(_) => tracing::trace!(%event_type, "event dropped, no subscribers"),
        }
        async { Ok(()) }
    }
}
