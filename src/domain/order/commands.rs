use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::pricing::OrderTotals;
use super::value_objects::{Address, OrderItem, OrderNumber, OrderStatus, PaymentIntentRecord, PaymentMethod};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    CreateOrder {
        order_number: OrderNumber,
        customer_id: Uuid,
        payment_method: PaymentMethod,
        items: Vec<OrderItem>,
        totals: OrderTotals,
        currency: String,
        coupon_code: Option<String>,
        shipping_address: Address,
        billing_address: Address,
        notes: Option<String>,
    },
    IssuePaymentIntent {
        intent: PaymentIntentRecord,
    },
    RecordPaymentSuccess {
        gateway_intent_id: String,
        transaction_id: String,
        amount: Decimal,
        currency: String,
        at: DateTime<Utc>,
    },
    RecordPaymentFailure {
        gateway_intent_id: String,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    RefundPayment {
        reason: Option<String>,
        refunded_by: Option<Uuid>,
        at: DateTime<Utc>,
    },
    ChangeStatus {
        target: OrderStatus,
        changed_by: Option<Uuid>,
        reason: Option<String>,
        tracking_number: Option<String>,
        carrier: Option<String>,
        at: DateTime<Utc>,
    },
    CancelOrder {
        reason: Option<String>,
        cancelled_by: Option<Uuid>,
        at: DateTime<Utc>,
    },
    ActivateWarranty {
        at: DateTime<Utc>,
    },
}

impl OrderCommand {
    /// Label used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::CreateOrder { .. } => "create_order",
            OrderCommand::IssuePaymentIntent { .. } => "issue_payment_intent",
            OrderCommand::RecordPaymentSuccess { .. } => "record_payment_success",
            OrderCommand::RecordPaymentFailure { .. } => "record_payment_failure",
            OrderCommand::RefundPayment { .. } => "refund_payment",
            OrderCommand::ChangeStatus { .. } => "change_status",
            OrderCommand::CancelOrder { .. } => "cancel_order",
            OrderCommand::ActivateWarranty { .. } => "activate_warranty",
        }
    }
}
