//! Redis Pub/Sub publisher for poll events.

#![allow(missing_docs)]

use async_trait::async_trait;
use fred::clients::Client;
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use toggo_common::{AppError, AppResult};
use toggo_core::services::{EventPublisher, PollEvent};
use tracing::{debug, info};
use uuid::Uuid;

/// Channel carrying every event of one trip.
#[must_use]
pub fn trip_channel(prefix: &str, trip_id: Uuid) -> String {
    format!("{prefix}:trip:{trip_id}")
}

/// Redis Pub/Sub manager for event distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    prefix: String,
}

impl RedisPubSub {
    /// Connect a publishing client.
    pub async fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config, None, None, None);
        publisher.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            prefix: prefix.into(),
        })
    }

    /// Serialize an event and publish it on its trip channel.
    pub async fn publish_event(&self, event: &PollEvent) -> AppResult<()> {
        let channel = trip_channel(&self.prefix, event.trip_id);
        let payload = encode_event(event)?;

        let _: () = self
            .publisher
            .publish(channel.as_str(), payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        debug!(channel = %channel, topic = %event.topic, "Published Pub/Sub event");
        Ok(())
    }

    /// Shutdown the publishing client.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

fn encode_event(event: &PollEvent) -> AppResult<String> {
    serde_json::to_string(event)
        .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))
}

/// Implementation of `EventPublisher` for `RedisPubSub`.
/// This allows core services to publish events without depending on Redis directly.
#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish(&self, event: &PollEvent) -> AppResult<()> {
        self.publish_event(event).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use toggo_core::services::PollTopic;

    #[test]
    fn test_trip_channel_name() {
        let trip_id = Uuid::parse_str("0192c3a4-5b6c-7d8e-9f00-112233445566").unwrap();
        assert_eq!(
            trip_channel("toggo", trip_id),
            "toggo:trip:0192c3a4-5b6c-7d8e-9f00-112233445566"
        );
    }

    #[test]
    fn test_encoded_event_is_envelope() {
        let trip_id = Uuid::new_v4();
        let event = PollEvent::new(
            PollTopic::Voted,
            trip_id,
            &serde_json::json!({"total_voters": 2}),
            Utc::now(),
        )
        .unwrap();

        let decoded: serde_json::Value =
            serde_json::from_str(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(decoded["topic"], "poll.voted");
        assert_eq!(decoded["trip_id"], trip_id.to_string());
        assert_eq!(decoded["payload"]["total_voters"], 2);
    }

    #[tokio::test]
    #[ignore = "requires running Redis instance"]
    async fn test_publish_to_redis() {
        let url = std::env::var("TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let pubsub = RedisPubSub::new(&url, "toggo-test").await.unwrap();

        let event = PollEvent::new(PollTopic::Created, Uuid::new_v4(), &(), Utc::now()).unwrap();
        pubsub.publish(&event).await.unwrap();
        pubsub.shutdown().await.unwrap();
    }
}
