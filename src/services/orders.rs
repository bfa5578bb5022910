use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::order::{
    CommandOutcome, OrderAggregate, OrderCommand, OrderCommandHandler, OrderEvent, OrderIndex, OrderStatus,
    PageRequest,
};
use crate::metrics::Metrics;
use super::context::RequestContext;
use super::errors::ServiceError;

// ============================================================================
// Order Service - reads and explicit lifecycle actions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<OrderAggregate>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Status and warranty metrics for whatever a command appended.
pub(crate) fn observe(metrics: &Metrics, outcome: &CommandOutcome) {
    if outcome.previous_status != outcome.order.status {
        metrics.record_transition(outcome.previous_status.as_str(), outcome.order.status.as_str());
        tracing::info!(
            order_id = %outcome.order.id,
            from = %outcome.previous_status,
            to = %outcome.order.status,
            "Order status changed"
        );
    }

    let activated: usize = outcome
        .events
        .iter()
        .map(|event| match event {
            OrderEvent::WarrantyActivated(e) => e.lines.len(),
            _ => 0,
        })
        .sum();
    if activated > 0 {
        metrics.record_warranties_activated(activated);
        tracing::info!(order_id = %outcome.order.id, lines = activated, "Warranty activated");
    }
}

#[derive(Clone)]
pub struct OrderService {
    handler: OrderCommandHandler,
    index: Arc<dyn OrderIndex>,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(handler: OrderCommandHandler, index: Arc<dyn OrderIndex>, metrics: Arc<Metrics>) -> Self {
        Self { handler, index, metrics }
    }

    pub async fn get(&self, ctx: &RequestContext, order_id: Uuid) -> Result<OrderAggregate, ServiceError> {
        let order = self.handler.load(order_id).await?;
        ctx.ensure_can_access(&order)?;
        Ok(order)
    }

    /// The caller's own orders, newest first
    pub async fn list(&self, ctx: &RequestContext, page: PageRequest) -> Result<OrderPage, ServiceError> {
        let index_page = self.index.list_for_customer(ctx.user_id, page).await?;

        let mut orders = Vec::with_capacity(index_page.entries.len());
        for entry in index_page.entries {
            match self.handler.load(entry.order_id).await {
                Ok(order) => orders.push(order),
                Err(e) => {
                    tracing::warn!(order_id = %entry.order_id, error = %e, "Indexed order could not be loaded");
                }
            }
        }

        Ok(OrderPage {
            orders,
            page: page.page,
            per_page: page.per_page,
            total: index_page.total,
        })
    }

    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        request: ReasonRequest,
    ) -> Result<OrderAggregate, ServiceError> {
        self.get(ctx, order_id).await?;

        let command = OrderCommand::CancelOrder {
            reason: request.reason,
            cancelled_by: Some(ctx.user_id),
            at: Utc::now(),
        };
        self.execute(ctx, order_id, command).await
    }

    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        request: UpdateStatus,
    ) -> Result<OrderAggregate, ServiceError> {
        ctx.require_admin()?;

        let command = OrderCommand::ChangeStatus {
            target: request.status,
            changed_by: Some(ctx.user_id),
            reason: request.reason,
            tracking_number: request.tracking_number,
            carrier: request.carrier,
            at: Utc::now(),
        };
        self.execute(ctx, order_id, command).await
    }

    pub async fn refund(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        request: ReasonRequest,
    ) -> Result<OrderAggregate, ServiceError> {
        ctx.require_admin()?;

        let command = OrderCommand::RefundPayment {
            reason: request.reason,
            refunded_by: Some(ctx.user_id),
            at: Utc::now(),
        };
        let order = self.execute(ctx, order_id, command).await?;
        tracing::info!(order_id = %order_id, refunded_by = %ctx.user_id, "Payment refunded");
        Ok(order)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        command: OrderCommand,
    ) -> Result<OrderAggregate, ServiceError> {
        let outcome = self
            .handler
            .handle(order_id, &command, ctx.correlation_id, Some(ctx.user_id))
            .await?;
        observe(&self.metrics, &outcome);
        Ok(outcome.order)
    }
}
