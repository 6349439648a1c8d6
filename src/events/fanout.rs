use async_trait::async_trait;
use std::sync::Arc;

use crate::ports::{EventPublisher, PublishError};

/// Delivers every event to all inner publishers, in registration order.
///
/// One sink failing does not stop delivery to the others; the failures are
/// reported together as `PublishError::Partial`.
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), PublishError> {
        let mut failures = Vec::new();

        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(topic, payload).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Partial(
                failures.len(),
                self.publishers.len(),
                failures.join("; "),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastEventPublisher;
    use serde_json::json;

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _: &str, _: &serde_json::Value) -> Result<(), PublishError> {
            Err(PublishError::Transport("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_sinks() {
        let broadcast = BroadcastEventPublisher::new(4);
        let mut rx = broadcast.subscribe();
        let fanout = FanoutPublisher::new(vec![
            Arc::new(FailingPublisher),
            Arc::new(broadcast.clone()),
        ]);

        let result = fanout.publish("topic", &json!({"k": 1})).await;

        assert!(matches!(result, Err(PublishError::Partial(1, 2, _))));
        assert_eq!(rx.recv().await.unwrap().topic, "topic");
    }

    #[tokio::test]
    async fn test_empty_fanout_succeeds() {
        let fanout = FanoutPublisher::new(Vec::new());
        assert!(fanout.is_empty());
        assert!(fanout.publish("topic", &json!(null)).await.is_ok());
    }
}
