use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use anyhow::Result;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata the store persists alongside them.
// Generic over the event type.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    // Who triggered this event
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_name().to_string(),
            event_version: E::event_version(),
            event_data,
            causation_id: None,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events implement this trait to be used with the event store.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Stable name of the concrete event, persisted as `event_type`.
    fn event_name(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct NoteAdded {
        text: String,
    }

    impl DomainEvent for NoteAdded {
        fn event_name(&self) -> &'static str { "NoteAdded" }
    }

    #[test]
    fn test_envelope_takes_name_from_event() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            aggregate_id,
            1,
            NoteAdded { text: "hello".to_string() },
            correlation_id,
        )
        .with_user(aggregate_id)
        .with_metadata("source", "test");

        assert_eq!(envelope.event_type, "NoteAdded");
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.user_id, Some(aggregate_id));
        assert_eq!(envelope.metadata.get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_event_serialization() {
        let event = NoteAdded { text: "payload".to_string() };

        let json = serialize_event(&event).unwrap();
        let deserialized: NoteAdded = deserialize_event(&json).unwrap();

        assert_eq!(deserialized.text, "payload");
    }
}
