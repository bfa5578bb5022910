use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::pricing::OrderTotals;
use crate::event_sourcing::DomainEvent;
use super::value_objects::{Address, OrderItem, OrderNumber, PaymentIntentRecord, PaymentMethod};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    PaymentIntentIssued(PaymentIntentIssued),
    PaymentSucceeded(PaymentSucceeded),
    PaymentFailed(PaymentFailed),
    PaymentRefunded(PaymentRefunded),
    Confirmed(OrderConfirmed),
    ProcessingStarted(OrderProcessingStarted),
    Shipped(OrderShipped),
    Completed(OrderCompleted),
    Cancelled(OrderCancelled),
    Failed(OrderFailed),
    WarrantyActivated(WarrantyActivated),
}

impl DomainEvent for OrderEvent {
    fn event_name(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::PaymentIntentIssued(_) => "PaymentIntentIssued",
            OrderEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::PaymentRefunded(_) => "PaymentRefunded",
            OrderEvent::Confirmed(_) => "OrderConfirmed",
            OrderEvent::ProcessingStarted(_) => "OrderProcessingStarted",
            OrderEvent::Shipped(_) => "OrderShipped",
            OrderEvent::Completed(_) => "OrderCompleted",
            OrderEvent::Cancelled(_) => "OrderCancelled",
            OrderEvent::Failed(_) => "OrderFailed",
            OrderEvent::WarrantyActivated(_) => "WarrantyActivated",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - items and prices copied from the cart snapshot
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
}

/// A new gateway intent replaces whichever one was active before
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaymentIntentIssued {
    pub intent: PaymentIntentRecord,
    pub superseded_intent_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaymentSucceeded {
    pub gateway_intent_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaymentFailed {
    pub gateway_intent_id: String,
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaymentRefunded {
    pub reason: Option<String>,
    pub refunded_by: Option<Uuid>,
    pub refunded_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderConfirmed {
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderProcessingStarted {
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderShipped {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCompleted {
    pub completed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCancelled {
    pub reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderFailed {
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineWarranty {
    /// Index into the order's items
    pub line: usize,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WarrantyActivated {
    pub lines: Vec<LineWarranty>,
}
