use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::order::{OrderAggregate, OrderCommand, OrderCommandHandler};
use crate::metrics::Metrics;
use super::context::RequestContext;
use super::errors::ServiceError;
use super::orders::observe;

/// Explicit, idempotent warranty activation for completed orders. Completion
/// already activates warranties; this picks up lines that were missed.
#[derive(Clone)]
pub struct WarrantyActivator {
    handler: OrderCommandHandler,
    metrics: Arc<Metrics>,
}

impl WarrantyActivator {
    pub fn new(handler: OrderCommandHandler, metrics: Arc<Metrics>) -> Self {
        Self { handler, metrics }
    }

    pub async fn activate(&self, ctx: &RequestContext, order_id: Uuid) -> Result<OrderAggregate, ServiceError> {
        ctx.require_admin()?;

        let command = OrderCommand::ActivateWarranty { at: Utc::now() };
        let outcome = self
            .handler
            .handle(order_id, &command, ctx.correlation_id, Some(ctx.user_id))
            .await?;

        if outcome.is_noop() {
            tracing::debug!(order_id = %order_id, "No warranty lines left to activate");
        }
        observe(&self.metrics, &outcome);
        Ok(outcome.order)
    }
}
