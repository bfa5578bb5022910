use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{DomainEvent, EventEnvelope};
use super::event_store::{check_sequence, EventStore, StoreError};

/// Process-local event store. The write lock makes the version check and
/// the append a single step.
pub struct InMemoryEventStore<E> {
    streams: RwLock<HashMap<Uuid, Vec<EventEnvelope<E>>>>,
}

impl<E> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for InMemoryEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        check_sequence(expected_version, &events)?;

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();

        let current = stream.len() as i64;
        if current != expected_version {
            return Err(StoreError::Conflict {
                aggregate_id,
                expected: expected_version,
                actual: current,
            });
        }

        let event_count = events.len();
        stream.extend(events);
        let new_version = stream.len() as i64;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = event_count,
            "Appended events to in-memory store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).map_or(0, |s| s.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct Ticked(u32);

    impl DomainEvent for Ticked {
        fn event_name(&self) -> &'static str { "Ticked" }
    }

    fn envelope(aggregate_id: Uuid, seq: i64) -> EventEnvelope<Ticked> {
        EventEnvelope::new(aggregate_id, seq, Ticked(seq as u32), Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_append_and_load_in_order() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        let version = store
            .append_events(id, 0, vec![envelope(id, 1), envelope(id, 2)])
            .await
            .unwrap();
        assert_eq!(version, 2);

        let version = store.append_events(id, 2, vec![envelope(id, 3)]).await.unwrap();
        assert_eq!(version, 3);

        let events = store.load_events(id).await.unwrap();
        let seqs: Vec<i64> = events.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(store.aggregate_exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        store.append_events(id, 0, vec![envelope(id, 1)]).await.unwrap();

        let result = store.append_events(id, 0, vec![envelope(id, 1)]).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict { expected: 0, actual: 1, .. })
        ));
        assert_eq!(store.current_version(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_gapped_sequence_is_rejected() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        let result = store.append_events(id, 0, vec![envelope(id, 2)]).await;
        assert!(matches!(result, Err(StoreError::OutOfSequence { expected_version: 0 })));

        let result = store.append_events(id, 0, vec![]).await;
        assert!(matches!(result, Err(StoreError::EmptyAppend)));
    }

    #[tokio::test]
    async fn test_unknown_stream_is_empty() {
        let store: InMemoryEventStore<Ticked> = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        assert!(store.load_events(id).await.unwrap().is_empty());
        assert_eq!(store.current_version(id).await.unwrap(), 0);
        assert!(!store.aggregate_exists(id).await.unwrap());
    }
}
