//! Where lifecycle notifications go.
//!
//! Producers publish `(topic, json)` pairs; what happens next (recording,
//! fan-out to subscribers, nothing) depends on the bus the host installed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// A topic plus its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl EmittedEvent {
    /// Decode the payload into one of the typed event structs.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

/// Sink for lifecycle notifications. Must never block the producer.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: EmittedEvent);
}

pub type EventBusRef = Arc<dyn EventBus>;

/// Serialize `payload` and publish it under `topic`.
pub fn publish_json<T: Serialize + ?Sized>(
    bus: &dyn EventBus,
    topic: &str,
    payload: &T,
) -> serde_json::Result<()> {
    let payload = serde_json::to_value(payload)?;
    bus.publish(EmittedEvent {
        topic: topic.to_string(),
        payload,
    });
    Ok(())
}

/// Keeps every published event, in order. Used by tests.
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    log: Mutex<Vec<EmittedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<EmittedEvent>> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.log().clone()
    }

    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.log()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads of `topic` that decode as `T`; others are skipped.
    pub fn decoded<T: DeserializeOwned>(&self, topic: &str) -> Vec<T> {
        self.log()
            .iter()
            .filter(|e| e.topic == topic)
            .filter_map(|e| e.decode().ok())
            .collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: EmittedEvent) {
        self.log().push(event);
    }
}

/// Fans events out to any number of runtime subscribers.
///
/// Dropping a receiver unsubscribes it. A receiver that falls more than
/// `capacity` events behind observes `RecvError::Lagged` and skips ahead.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity.max(1)).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: EmittedEvent) {
        // Fails only when nobody is subscribed.
        let _ = self.sender.send(event);
    }
}

/// Drops everything.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&self, _event: EmittedEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_names, ModelResidencyEvent};
    use serde_json::json;

    #[test]
    fn test_recorder_filters_by_topic() {
        let bus = InMemoryEventBus::new();
        publish_json(&bus, event_names::MODEL_READY, &json!({"model_id": "a"})).unwrap();
        publish_json(&bus, event_names::STATE_CHANGED, &json!({"model_id": "a"})).unwrap();
        publish_json(&bus, event_names::MODEL_READY, &json!({"model_id": "b"})).unwrap();

        let ready = bus.events_for(event_names::MODEL_READY);
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[1].payload["model_id"], "b");
        assert_eq!(bus.len(), 3);

        bus.clear();
        assert!(bus.is_empty());
    }

    #[test]
    fn test_decoded_skips_foreign_payloads() {
        let bus = InMemoryEventBus::new();
        let event = ModelResidencyEvent {
            model_id: "m1".into(),
            loaded: false,
            reason: Some("explicit".into()),
        };
        publish_json(&bus, event_names::MODEL_RESIDENCY, &event).unwrap();
        publish_json(&bus, event_names::MODEL_RESIDENCY, &json!("garbage")).unwrap();

        let decoded: Vec<ModelResidencyEvent> = bus.decoded(event_names::MODEL_RESIDENCY);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].reason.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_each_subscriber() {
        let bus = BroadcastEventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        publish_json(&bus, event_names::MODEL_READY, &json!({"model_id": "m1"})).unwrap();

        assert_eq!(first.recv().await.unwrap().payload["model_id"], "m1");
        assert_eq!(second.recv().await.unwrap().topic, event_names::MODEL_READY);

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        BroadcastEventBus::new(1).publish(EmittedEvent {
            topic: "x".into(),
            payload: json!(null),
        });
        NullEventBus.publish(EmittedEvent {
            topic: "x".into(),
            payload: json!(null),
        });
    }
}
