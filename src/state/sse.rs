use tokio::sync::broadcast;
use tracing::warn;

use crate::{
    dto::sse::{ServerEvent, TierChangedEvent},
    state::{balance::TierChange, cache::TierObserver},
};

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

impl TierObserver for SseHub {
    fn tier_changed(&self, change: &TierChange) {
        match ServerEvent::json(
            Some("tier_changed".to_string()),
            &TierChangedEvent::from(change),
        ) {
            Ok(event) => self.broadcast(event),
            Err(err) => warn!(identity = %change.identity, error = %err, "failed to encode tier change"),
        }
    }
}
