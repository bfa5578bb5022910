use async_trait::async_trait;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};

// ============================================================================
// Event Store - Repository for Events
// ============================================================================
//
// Responsibilities:
// 1. Append events to an aggregate's stream (append-only)
// 2. Load event history for aggregates
// 3. Optimistic concurrency: an append only commits when the stream is
//    still at `expected_version`, atomically for the whole event batch
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, but current is {actual}")]
    Conflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Cannot append empty event list")]
    EmptyAppend,

    #[error("Event sequence numbers must continue from version {expected_version}")]
    OutOfSequence { expected_version: i64 },

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored stream for {aggregate_id} is corrupt: {reason}")]
    Corrupt { aggregate_id: Uuid, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait EventStore<E: DomainEvent>: Send + Sync {
    /// Append events to the stream. Returns the new version.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError>;

    /// Load all events for an aggregate, ordered by sequence number
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError>;

    /// Current version of the aggregate; 0 for a stream that does not exist
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError>;

    async fn aggregate_exists(&self, aggregate_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.current_version(aggregate_id).await? > 0)
    }
}

/// Checks that envelopes continue the stream from `expected_version` without gaps.
pub fn check_sequence<E>(expected_version: i64, events: &[EventEnvelope<E>]) -> Result<(), StoreError> {
    if events.is_empty() {
        return Err(StoreError::EmptyAppend);
    }

    let contiguous = events
        .iter()
        .zip(expected_version + 1..)
        .all(|(envelope, seq)| envelope.sequence_number == seq);

    if contiguous {
        Ok(())
    } else {
        Err(StoreError::OutOfSequence { expected_version })
    }
}

/// Load and fold an aggregate; `None` when the stream is empty.
pub async fn load_aggregate<A, E>(
    store: &dyn EventStore<E>,
    aggregate_id: Uuid,
) -> Result<Option<A>, StoreError>
where
    E: DomainEvent,
    A: Aggregate<Event = E>,
    A::Error: std::fmt::Display,
{
    let events = store.load_events(aggregate_id).await?;

    if events.is_empty() {
        return Ok(None);
    }

    A::load_from_events(&events)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            aggregate_id,
            reason: e.to_string(),
        })
}
