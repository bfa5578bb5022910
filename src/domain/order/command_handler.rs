use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::{load_aggregate, Aggregate, EventEnvelope, EventStore, StoreError};
use crate::metrics::Metrics;

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// A stale expected version means another writer got there first; the
// command is re-evaluated against the fresh stream a bounded number of times.
//
// ============================================================================

pub const MAX_CONFLICT_RETRIES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] OrderError),

    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error("Order {0} was modified concurrently, please retry")]
    ConcurrentModification(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// State after the command plus the events it produced (empty for no-ops)
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub order: OrderAggregate,
    pub previous_status: OrderStatus,
    pub events: Vec<OrderEvent>,
}

impl CommandOutcome {
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Clone)]
pub struct OrderCommandHandler {
    event_store: Arc<dyn EventStore<OrderEvent>>,
    metrics: Arc<Metrics>,
}

impl OrderCommandHandler {
    pub fn new(event_store: Arc<dyn EventStore<OrderEvent>>, metrics: Arc<Metrics>) -> Self {
        Self { event_store, metrics }
    }

    pub async fn load(&self, order_id: Uuid) -> Result<OrderAggregate, CommandError> {
        load_aggregate::<OrderAggregate, _>(self.event_store.as_ref(), order_id)
            .await?
            .ok_or(CommandError::NotFound(order_id))
    }

    /// Start a new order stream
    pub async fn create(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<CommandOutcome, CommandError> {
        let events = OrderAggregate::create(&command)?;
        let envelopes = Self::wrap(order_id, 0, &events, correlation_id, None);

        match self.event_store.append_events(order_id, 0, envelopes.clone()).await {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => return Err(OrderError::AlreadyCreated.into()),
            Err(e) => return Err(e.into()),
        }

        let order = OrderAggregate::load_from_events(&envelopes).map_err(|e| StoreError::Corrupt {
            aggregate_id: order_id,
            reason: e.to_string(),
        })?;

        tracing::debug!(order_id = %order_id, "Order stream created");
        Ok(CommandOutcome {
            previous_status: order.status,
            order,
            events,
        })
    }

    /// Handle a command against an existing order and persist resulting events
    pub async fn handle(
        &self,
        order_id: Uuid,
        command: &OrderCommand,
        correlation_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<CommandOutcome, CommandError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut order = self.load(order_id).await?;
            let expected_version = order.version();
            let previous_status = order.status;

            let events = order.handle_command(command).inspect_err(|e| {
                self.metrics.record_rejected_command(command.name(), e.kind());
            })?;
            if events.is_empty() {
                return Ok(CommandOutcome { order, previous_status, events });
            }

            let envelopes = Self::wrap(order_id, expected_version, &events, correlation_id, user_id);

            match self.event_store.append_events(order_id, expected_version, envelopes.clone()).await {
                Ok(_) => {
                    for envelope in &envelopes {
                        order.apply_event(&envelope.event_data, envelope.timestamp)?;
                    }
                    return Ok(CommandOutcome { order, previous_status, events });
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    tracing::debug!(
                        order_id = %order_id,
                        command = command.name(),
                        attempt,
                        expected_version,
                        actual,
                        "Version conflict, re-evaluating command"
                    );
                    self.metrics.command_conflicts.inc();
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(order_id = %order_id, command = command.name(), "Giving up after repeated version conflicts");
        Err(CommandError::ConcurrentModification(order_id))
    }

    fn wrap(
        order_id: Uuid,
        expected_version: i64,
        events: &[OrderEvent],
        correlation_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Vec<EventEnvelope<OrderEvent>> {
        events
            .iter()
            .cloned()
            .zip(expected_version + 1..)
            .map(|(event, seq)| {
                let envelope = EventEnvelope::new(order_id, seq, event, correlation_id);
                match user_id {
                    Some(user) => envelope.with_user(user),
                    None => envelope,
                }
            })
            .collect()
    }
}
