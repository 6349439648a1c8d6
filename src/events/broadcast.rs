use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ports::{EventPublisher, PublishError};

pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// One event as seen by in-process subscribers such as the websocket feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-process publisher backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), PublishError> {
        let event = PublishedEvent {
            topic: topic.to_string(),
            payload: payload.clone(),
        };
        // No subscribers is not an error.
        if self.sender.send(event).is_err() {
            tracing::trace!(topic, "No live subscribers for event");
        }
        Ok(())
    }
}
