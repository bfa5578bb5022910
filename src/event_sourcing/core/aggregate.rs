use uuid::Uuid;
use chrono::{DateTime, Utc};
use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated against current state before emitting events
// 3. Events represent facts that have already happened
// 4. Applying an event never fails for a well-formed stream
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from the first event of its stream
    fn apply_first_event(
        aggregate_id: Uuid,
        event: &Self::Event,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state. Increments the version.
    fn apply_event(&mut self, event: &Self::Event, recorded_at: DateTime<Utc>) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Current version (sequence number of the last applied event)
    fn version(&self) -> i64;

    /// Reconstruct from event history
    fn load_from_events(events: &[EventEnvelope<Self::Event>]) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let Some((first, rest)) = events.split_first() else {
            anyhow::bail!("No events to load");
        };

        let mut aggregate = Self::apply_first_event(first.aggregate_id, &first.event_data, first.timestamp)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;

        for envelope in rest {
            aggregate.apply_event(&envelope.event_data, envelope.timestamp)
                .map_err(|e| anyhow::anyhow!("Failed to apply event {}: {}", envelope.sequence_number, e))?;
        }

        Ok(aggregate)
    }
}
