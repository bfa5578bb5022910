use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use uuid::Uuid;

use crate::event_sourcing::core::{deserialize_event, serialize_event, DomainEvent, EventEnvelope};
use super::event_store::{check_sequence, EventStore, StoreError};

// ============================================================================
// ScyllaDB Event Store
// ============================================================================
//
// One partition per aggregate, clustered by sequence number. Appends are a
// conditional batch of `INSERT ... IF NOT EXISTS` rows in that single
// partition, so two writers racing for the same sequence number cannot both
// commit, and a batch is applied entirely or not at all.
//
// ============================================================================

const CREATE_EVENT_TABLE: &str = "CREATE TABLE IF NOT EXISTS event_store (
    aggregate_id uuid,
    sequence_number bigint,
    aggregate_type text,
    event_id uuid,
    event_type text,
    event_version int,
    event_data text,
    causation_id uuid,
    correlation_id uuid,
    user_id uuid,
    metadata map<text, text>,
    timestamp timestamp,
    PRIMARY KEY (aggregate_id, sequence_number)
) WITH CLUSTERING ORDER BY (sequence_number ASC)";

const INSERT_EVENT: &str = "INSERT INTO event_store (
    aggregate_id, sequence_number, aggregate_type, event_id, event_type, event_version,
    event_data, causation_id, correlation_id, user_id, metadata, timestamp
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS";

type EventRow = (
    Uuid,
    i64,
    String,
    Uuid,
    String,
    i32,
    String,
    Option<Uuid>,
    Uuid,
    Option<Uuid>,
    HashMap<String, String>,
    DateTime<Utc>,
);

fn backend<Err: std::fmt::Display>(err: Err) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Create the event table in the session's current keyspace.
pub async fn ensure_event_schema(session: &Session) -> Result<(), StoreError> {
    session
        .query_unpaged(CREATE_EVENT_TABLE, &[])
        .await
        .map_err(backend)?;
    Ok(())
}

pub struct ScyllaEventStore<E: DomainEvent> {
    session: Arc<Session>,
    aggregate_type_name: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> ScyllaEventStore<E> {
    pub fn new(session: Arc<Session>, aggregate_type_name: &str) -> Self {
        Self {
            session,
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for ScyllaEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        check_sequence(expected_version, &events)?;

        let current_version = self.current_version(aggregate_id).await?;
        if current_version != expected_version {
            return Err(StoreError::Conflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut batch = Batch::default();
        let mut values: Vec<EventRow> = Vec::with_capacity(events.len());

        for envelope in &events {
            batch.append_statement(INSERT_EVENT);
            values.push((
                aggregate_id,
                envelope.sequence_number,
                self.aggregate_type_name.clone(),
                envelope.event_id,
                envelope.event_type.clone(),
                envelope.event_version,
                serialize_event(&envelope.event_data).map_err(backend)?,
                envelope.causation_id,
                envelope.correlation_id,
                envelope.user_id,
                envelope.metadata.clone(),
                envelope.timestamp,
            ));
        }

        let result = self.session.batch(&batch, values).await.map_err(backend)?;

        // Conditional batches report `[applied]` as the first column.
        let applied = result
            .into_rows_result()
            .map_err(backend)?
            .maybe_first_row::<Row>()
            .map_err(backend)?
            .and_then(|row| row.columns.into_iter().next().flatten())
            .map(|value| matches!(value, CqlValue::Boolean(true)))
            .unwrap_or(false);

        if !applied {
            let actual = self.current_version(aggregate_id).await?;
            tracing::warn!(
                aggregate_id = %aggregate_id,
                expected_version = expected_version,
                actual_version = actual,
                "Conditional append lost the race"
            );
            return Err(StoreError::Conflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let new_version = expected_version + events.len() as i64;

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let result = self.session
            .query_unpaged(
                "SELECT aggregate_id, sequence_number, aggregate_type, event_id, event_type,
                        event_version, event_data, causation_id, correlation_id, user_id,
                        metadata, timestamp
                 FROM event_store
                 WHERE aggregate_id = ?
                 ORDER BY sequence_number ASC",
                (aggregate_id,),
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let mut events = Vec::new();

        for row in rows_result.rows::<EventRow>().map_err(backend)? {
            let (
                agg_id,
                sequence_number,
                _aggregate_type,
                event_id,
                event_type,
                event_version,
                event_data_json,
                causation_id,
                correlation_id,
                user_id,
                metadata,
                timestamp,
            ) = row.map_err(backend)?;

            let event_data: E = deserialize_event(&event_data_json).map_err(|e| StoreError::Corrupt {
                aggregate_id,
                reason: format!("event {} ({}): {}", sequence_number, event_type, e),
            })?;

            events.push(EventEnvelope {
                event_id,
                aggregate_id: agg_id,
                sequence_number,
                event_type,
                event_version,
                event_data,
                causation_id,
                correlation_id,
                user_id,
                timestamp,
                metadata,
            });
        }

        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let result = self.session
            .query_unpaged(
                "SELECT sequence_number FROM event_store
                 WHERE aggregate_id = ?
                 ORDER BY sequence_number DESC LIMIT 1",
                (aggregate_id,),
            )
            .await
            .map_err(backend)?;

        let version = result
            .into_rows_result()
            .map_err(backend)?
            .maybe_first_row::<(i64,)>()
            .map_err(backend)?
            .map_or(0, |(version,)| version);

        Ok(version)
    }
}
