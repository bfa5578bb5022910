use rust_decimal::Decimal;

use crate::domain::warranty::WarrantyRangeError;
use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot cancel an order that is {0}")]
    CannotCancel(OrderStatus),

    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order is {0} and accepts no further status changes")]
    Terminal(OrderStatus),

    #[error("Order cannot be paid online: {0}")]
    NotPayable(String),

    #[error("Payment intent {0} is no longer valid for this order; restart payment")]
    StaleIntent(String),

    #[error("Intent amount {intent} does not match order total {order}")]
    IntentAmountMismatch { intent: Decimal, order: Decimal },

    #[error("Cannot refund a payment that is {0}")]
    NotRefundable(PaymentStatus),

    #[error("Warranty can only be activated on a completed order, this one is {0}")]
    WarrantyRequiresCompletion(OrderStatus),

    #[error(transparent)]
    WarrantyOutOfRange(#[from] WarrantyRangeError),

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid quantity on line {0}")]
    InvalidQuantity(usize),

    #[error("Line {0} total does not equal unit price times quantity")]
    LineTotalMismatch(usize),

    #[error("Order totals are inconsistent with its lines")]
    TotalsInconsistent,

    #[error("{address} address is missing {field}")]
    InvalidAddress { address: &'static str, field: &'static str },

    #[error("Order already exists")]
    AlreadyCreated,

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl OrderError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CannotCancel(_) | Self::InvalidTransition { .. } | Self::Terminal(_) => "invalid_transition",
            Self::NotPayable(_) => "not_payable",
            Self::StaleIntent(_) | Self::IntentAmountMismatch { .. } => "stale_intent",
            Self::NotRefundable(_) => "not_refundable",
            Self::WarrantyRequiresCompletion(_) | Self::WarrantyOutOfRange(_) => "warranty",
            Self::EmptyItems
            | Self::InvalidQuantity(_)
            | Self::LineTotalMismatch(_)
            | Self::TotalsInconsistent
            | Self::InvalidAddress { .. } => "validation",
            Self::AlreadyCreated | Self::NotInitialized => "lifecycle",
        }
    }
}
