//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time poll events.
//! The actual implementation is provided by the realtime crate (Redis Pub/Sub).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use toggo_common::{AppError, AppResult};
use uuid::Uuid;

/// Kinds of poll events broadcast to trip subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollTopic {
    #[serde(rename = "poll.created")]
    Created,
    #[serde(rename = "poll.updated")]
    Updated,
    #[serde(rename = "poll.deleted")]
    Deleted,
    #[serde(rename = "poll.voted")]
    Voted,
    #[serde(rename = "poll.ranking_submitted")]
    RankingSubmitted,
}

impl PollTopic {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "poll.created",
            Self::Updated => "poll.updated",
            Self::Deleted => "poll.deleted",
            Self::Voted => "poll.voted",
            Self::RankingSubmitted => "poll.ranking_submitted",
        }
    }
}

impl fmt::Display for PollTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope published for every poll event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollEvent {
    pub topic: PollTopic,
    pub trip_id: Uuid,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl PollEvent {
    /// Build an event, serializing the payload.
    pub fn new<T: Serialize + ?Sized>(
        topic: PollTopic,
        trip_id: Uuid,
        payload: &T,
        emitted_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| AppError::Internal(format!("Failed to serialize {topic} payload: {e}")))?;
        Ok(Self {
            topic,
            trip_id,
            payload,
            emitted_at,
        })
    }
}

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without directly depending on the pubsub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event to the trip's subscribers.
    async fn publish(&self, event: &PollEvent) -> AppResult<()>;
}

/// No-op event publisher for when real-time is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: &PollEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Type alias for a shared event publisher.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// Publish an event, logging and swallowing any failure.
pub async fn publish_best_effort<T: Serialize + ?Sized>(
    publisher: Option<&EventPublisherService>,
    topic: PollTopic,
    trip_id: Uuid,
    payload: &T,
    emitted_at: DateTime<Utc>,
) {
    let Some(publisher) = publisher else {
        return;
    };

    let event = match PollEvent::new(topic, trip_id, payload, emitted_at) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, topic = %topic, trip_id = %trip_id, "Failed to build poll event");
            return;
        }
    };

    if let Err(e) = publisher.publish(&event).await {
        tracing::warn!(error = %e, topic = %topic, trip_id = %trip_id, "Failed to publish poll event");
    }
}
