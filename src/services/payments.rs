use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{
    OrderAggregate, OrderCommand, OrderCommandHandler, OrderEvent, OrderStatus, PaymentIntentRecord, PaymentStatus,
};
use crate::health::ComponentHealth;
use crate::metrics::Metrics;
use crate::payments::{CreateIntentRequest, GatewayError, GatewayIntent, GatewayIntentStatus, GatewayRegistry, PaymentGateway};
use super::context::RequestContext;
use super::errors::ServiceError;
use super::orders::observe;

// ============================================================================
// Payment Coordinator
// ============================================================================
//
// Bridges orders and gateway intents. An order has at most one active
// intent; issuing a new one supersedes the old, which is cancelled at the
// gateway and can never confirm the order again. Confirmation may arrive
// any number of times for the same intent and only the first one mutates.
//
// ============================================================================

pub const DEFAULT_INTENT_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntent {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    pub gateway_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentHandle {
    pub gateway_intent_id: String,
    pub client_secret: String,
    #[serde(skip)]
    pub reused: bool,
}

impl From<&PaymentIntentRecord> for IntentHandle {
    fn from(record: &PaymentIntentRecord) -> Self {
        Self {
            gateway_intent_id: record.gateway_intent_id.clone(),
            client_secret: record.client_secret.clone(),
            reused: false,
        }
    }
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    handler: OrderCommandHandler,
    gateways: GatewayRegistry,
    intent_ttl: chrono::Duration,
    metrics: Arc<Metrics>,
}

impl PaymentCoordinator {
    pub fn new(
        handler: OrderCommandHandler,
        gateways: GatewayRegistry,
        intent_ttl: chrono::Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            handler,
            gateways,
            intent_ttl,
            metrics,
        }
    }

    pub async fn create_intent(&self, ctx: &RequestContext, order_id: Uuid) -> Result<IntentHandle, ServiceError> {
        let order = self.handler.load(order_id).await?;
        ctx.ensure_can_access(&order)?;

        if let Some(problem) = order.payability_problem() {
            self.metrics.record_payment_intent("not_payable");
            return Err(ServiceError::OrderNotPayable(format!("Order cannot be paid online: {problem}")));
        }
        let gateway = self.gateways.for_method(order.payment_method).ok_or_else(|| {
            ServiceError::OrderNotPayable(format!("No payment gateway configured for {}", order.payment_method))
        })?;

        if let Some(active) = self.reusable_intent(&order) {
            tracing::debug!(order_id = %order_id, intent_id = %active.gateway_intent_id, "Reusing active intent");
            self.metrics.record_payment_intent("reused");
            return Ok(IntentHandle {
                reused: true,
                ..IntentHandle::from(active)
            });
        }

        let request = CreateIntentRequest {
            order_id,
            amount: order.totals.total_amount,
            currency: order.currency.clone(),
            idempotency_key: format!("order-{}-v{}", order_id, order.version),
        };
        let intent = gateway.create_intent(&request).await.inspect_err(|e| {
            tracing::warn!(order_id = %order_id, gateway = gateway.name(), error = %e, "Intent creation failed");
            self.metrics.record_payment_intent("gateway_error");
        })?;

        let record = PaymentIntentRecord {
            gateway_intent_id: intent.id.clone(),
            client_secret: intent.client_secret.clone(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            issued_at: Utc::now(),
        };
        let command = OrderCommand::IssuePaymentIntent { intent: record.clone() };
        let outcome = self
            .handler
            .handle(order_id, &command, ctx.correlation_id, Some(ctx.user_id))
            .await?;

        let handle = outcome
            .order
            .active_intent
            .as_ref()
            .map(IntentHandle::from)
            .unwrap_or_else(|| IntentHandle::from(&record));

        if outcome.is_noop() {
            self.metrics.record_payment_intent("reused");
            return Ok(IntentHandle { reused: true, ..handle });
        }

        self.metrics.record_payment_intent("issued");
        tracing::info!(
            order_id = %order_id,
            intent_id = %handle.gateway_intent_id,
            amount = %record.amount,
            "Payment intent issued"
        );

        // The append may have been retried against a newer stream, so the
        // intent to cancel is the one the recorded event superseded.
        let superseded = outcome.events.iter().find_map(|event| match event {
            OrderEvent::PaymentIntentIssued(issued) => issued.superseded_intent_id.as_deref(),
            _ => None,
        });
        if let Some(superseded) = superseded.filter(|id| *id != handle.gateway_intent_id) {
            self.cancel_superseded(gateway.as_ref(), order_id, superseded).await;
        }

        Ok(handle)
    }

    /// Reconcile the order with the gateway's view of `gateway_intent_id`.
    pub async fn confirm_payment(
        &self,
        ctx: &RequestContext,
        gateway_intent_id: &str,
    ) -> Result<PaymentStatus, ServiceError> {
        let intent = self.find_intent(gateway_intent_id).await?;
        let order_id = intent
            .order_ref
            .ok_or_else(|| ServiceError::StaleIntent(format!("Payment intent {} belongs to no order", intent.id)))?;

        let order = self.handler.load(order_id).await?;
        ctx.ensure_can_access(&order)?;

        if order.is_paid_by(&intent.id) {
            self.metrics.record_payment_confirmation("duplicate");
            tracing::debug!(order_id = %order_id, intent_id = %intent.id, "Payment already recorded");
            return Ok(order.payment_status);
        }

        if !Self::matches_active_intent(&order, &intent) {
            self.metrics.record_payment_confirmation("stale");
            return Err(ServiceError::StaleIntent(format!(
                "Payment intent {} is no longer valid for this order; restart payment",
                intent.id
            )));
        }

        let command = match intent.status {
            GatewayIntentStatus::Pending => {
                self.metrics.record_payment_confirmation("pending");
                return Ok(order.payment_status);
            }
            GatewayIntentStatus::Succeeded => OrderCommand::RecordPaymentSuccess {
                gateway_intent_id: intent.id.clone(),
                transaction_id: intent.id.clone(),
                amount: intent.amount,
                currency: intent.currency.clone(),
                at: Utc::now(),
            },
            GatewayIntentStatus::Failed | GatewayIntentStatus::Canceled => OrderCommand::RecordPaymentFailure {
                gateway_intent_id: intent.id.clone(),
                reason: intent
                    .failure_reason
                    .clone()
                    .or_else(|| (intent.status == GatewayIntentStatus::Canceled).then(|| "canceled".to_string())),
                at: Utc::now(),
            },
        };

        let outcome = self
            .handler
            .handle(order_id, &command, ctx.correlation_id, Some(ctx.user_id))
            .await?;
        observe(&self.metrics, &outcome);

        let order = outcome.order;
        match order.payment_status {
            PaymentStatus::Paid => {
                self.metrics.record_payment_confirmation("paid");
                if order.status == OrderStatus::Cancelled {
                    tracing::warn!(
                        order_id = %order_id,
                        intent_id = %intent.id,
                        amount = %intent.amount,
                        "Payment captured for a cancelled order; needs reconciliation"
                    );
                } else {
                    tracing::info!(order_id = %order_id, intent_id = %intent.id, "Payment recorded");
                }
            }
            PaymentStatus::Failed => {
                self.metrics.record_payment_confirmation("failed");
                tracing::info!(order_id = %order_id, intent_id = %intent.id, reason = ?intent.failure_reason, "Payment failed");
            }
            status => {
                self.metrics.record_payment_confirmation(if outcome.events.is_empty() { "duplicate" } else { "other" });
                tracing::debug!(order_id = %order_id, payment_status = %status, "Confirmation left payment unchanged");
            }
        }

        Ok(order.payment_status)
    }

    pub async fn gateway_health(&self) -> Vec<ComponentHealth> {
        let mut components = Vec::new();
        for gateway in self.gateways.distinct() {
            components.push(gateway.health().await);
        }
        components
    }

    fn reusable_intent<'a>(&self, order: &'a OrderAggregate) -> Option<&'a PaymentIntentRecord> {
        order.active_intent.as_ref().filter(|active| {
            order.payment_status == PaymentStatus::Pending
                && active.amount == order.totals.total_amount
                && active.currency == order.currency
                && active.is_fresh(Utc::now(), self.intent_ttl)
        })
    }

    fn matches_active_intent(order: &OrderAggregate, intent: &GatewayIntent) -> bool {
        order.active_intent.as_ref().is_some_and(|active| {
            active.gateway_intent_id == intent.id
                && intent.amount == order.totals.total_amount
                && intent.currency.eq_ignore_ascii_case(&order.currency)
        })
    }

    /// The intent id carries no gateway hint, so ask each gateway in turn.
    async fn find_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent, ServiceError> {
        for gateway in self.gateways.distinct() {
            match gateway.retrieve_intent(gateway_intent_id).await {
                Ok(intent) => return Ok(intent),
                Err(GatewayError::NotFound(_)) => continue,
                Err(e) => {
                    self.metrics.record_payment_confirmation("gateway_error");
                    tracing::warn!(intent_id = %gateway_intent_id, gateway = gateway.name(), error = %e, "Intent lookup failed");
                    return Err(e.into());
                }
            }
        }

        Err(ServiceError::NotFound("Payment intent".to_string()))
    }

    async fn cancel_superseded(&self, gateway: &dyn PaymentGateway, order_id: Uuid, intent_id: &str) {
        match gateway.cancel_intent(intent_id).await {
            Ok(()) => tracing::debug!(order_id = %order_id, intent_id = %intent_id, "Superseded intent cancelled"),
            Err(e) => tracing::warn!(
                order_id = %order_id,
                intent_id = %intent_id,
                error = %e,
                "Could not cancel superseded intent"
            ),
        }
    }
}
