use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::ports::{EventPublisher, PublishError};

/// Appends events to Redis streams, one stream per topic (`XADD <prefix><topic> * payload <json>`).
///
/// A single multiplexed connection is shared, so events from one process reach
/// Redis in call order. The connection is opened lazily and dropped on error so
/// the next publish reconnects.
pub struct RedisEventPublisher {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    stream_prefix: String,
    timeout: Duration,
}

impl RedisEventPublisher {
    pub fn new(redis_url: &str, stream_prefix: String, timeout: Duration) -> Result<Self, PublishError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            stream_prefix,
            timeout,
        })
    }

    pub fn stream_key(&self, topic: &str) -> String {
        format!("{}{}", self.stream_prefix, topic)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, PublishError> {
        if let Some(conn) = self.connection.lock().await.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_tokio_connection().await?;
        *self.connection.lock().await = Some(conn.clone());
        Ok(conn)
    }

    async fn xadd(&self, key: &str, body: String) -> Result<String, PublishError> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("XADD")
            .arg(key)
            .arg("*")
            .arg("payload")
            .arg(body)
            .query_async::<_, String>(&mut conn)
            .await;

        if result.is_err() {
            self.connection.lock().await.take();
        }
        Ok(result?)
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), PublishError> {
        let key = self.stream_key(topic);
        let body = serde_json::to_string(payload)?;

        match timeout(self.timeout, self.xadd(&key, body)).await {
            Ok(Ok(entry_id)) => {
                tracing::debug!(stream = %key, entry_id = %entry_id, "Event appended");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // The connection may be wedged; force a reconnect next time.
                self.connection.lock().await.take();
                Err(PublishError::Timeout {
                    topic: topic.to_string(),
                    timeout_ms: self.timeout.as_millis(),
                })
            }
        }
    }
}
