//! # Event Bus
//!
//! `publish`/`subscribe` seam over the broker. Contract: durable delivery is
//! at-least-once, events on one topic arrive in publish order, and each topic
//! has a single logical consumer. The in-memory implementation provides the
//! ordering and single-consumer parts; durability belongs to a real broker
//! behind the same trait.

use crate::error::{CollectionError, Result};
use crate::messaging::message::SagaEvent;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Ordered stream of events for one topic
pub type EventStream = mpsc::UnboundedReceiver<SagaEvent>;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, event: SagaEvent) -> Result<()>;

    /// Take the consumer side of a topic. Each topic supports one logical
    /// consumer; a second subscribe to the same topic is a wiring bug.
    fn subscribe(&self, topic: &str) -> Result<EventStream>;
}

struct TopicChannel {
    tx: mpsc::UnboundedSender<SagaEvent>,
    rx: Mutex<Option<EventStream>>,
}

impl TopicChannel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

/// In-process event bus with one ordered queue per topic
#[derive(Default)]
pub struct InMemoryEventBus {
    topics: DashMap<String, TopicChannel>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, event: SagaEvent) -> Result<()> {
        let channel = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(TopicChannel::new);

        if channel.tx.send(event).is_err() {
            // Receiver dropped: the consumer went away. With a durable broker
            // the event would be redelivered; here the sweeper covers it.
            warn!(topic = %topic, "Event published to topic with dropped consumer");
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<EventStream> {
        let channel = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(TopicChannel::new);

        // Bind before ok_or_else so the guard drops ahead of `channel`
        let stream = channel.rx.lock().take();
        stream.ok_or_else(|| {
            CollectionError::event(format!("topic {topic} already has a consumer"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::EventOutcome;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_preserves_order_per_topic() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.subscribe("TOPIC_A").unwrap();

        for step in ["FIRST", "SECOND", "THIRD"] {
            bus.publish(
                "TOPIC_A",
                SagaEvent::new(Uuid::new_v4(), step, EventOutcome::Success, json!({})),
            )
            .await
            .unwrap();
        }

        assert_eq!(stream.recv().await.unwrap().event_type, "FIRST");
        assert_eq!(stream.recv().await.unwrap().event_type, "SECOND");
        assert_eq!(stream.recv().await.unwrap().event_type, "THIRD");
    }

    #[tokio::test]
    async fn test_second_subscribe_is_rejected() {
        let bus = InMemoryEventBus::new();
        let _stream = bus.subscribe("TOPIC_A").unwrap();
        assert!(bus.subscribe("TOPIC_A").is_err());
    }

    #[tokio::test]
    async fn test_publish_before_subscribe_is_buffered() {
        let bus = InMemoryEventBus::new();
        bus.publish(
            "TOPIC_B",
            SagaEvent::new(Uuid::new_v4(), "EARLY", EventOutcome::Success, json!({})),
        )
        .await
        .unwrap();

        let mut stream = bus.subscribe("TOPIC_B").unwrap();
        assert_eq!(stream.recv().await.unwrap().event_type, "EARLY");
    }
}
