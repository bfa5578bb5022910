use crate::domain::cart::CartError;
use crate::domain::order::{CommandError, OrderError};
use crate::domain::pricing::PricingError;
use crate::event_sourcing::StoreError;
use crate::payments::GatewayError;

// ============================================================================
// Service Errors - what callers of the storefront see
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    OrderNotPayable(String),

    #[error("{0}")]
    StaleIntent(String),

    #[error("{0}")]
    GatewayUnavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    ConcurrentModification(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::InvalidTransition(_) => "invalid_transition",
            ServiceError::OrderNotPayable(_) => "order_not_payable",
            ServiceError::StaleIntent(_) => "stale_intent",
            ServiceError::GatewayUnavailable(_) => "gateway_unavailable",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ConcurrentModification(_) => "concurrent_modification",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn order_not_found() -> Self {
        ServiceError::NotFound("Order".to_string())
    }

    fn internal(source: impl std::fmt::Display) -> Self {
        tracing::error!(error = %source, "Internal failure");
        ServiceError::Internal(source.to_string())
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::CannotCancel(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::Terminal(_)
            | OrderError::NotRefundable(_)
            | OrderError::WarrantyRequiresCompletion(_) => ServiceError::InvalidTransition(message),

            OrderError::NotPayable(_) | OrderError::IntentAmountMismatch { .. } => {
                ServiceError::OrderNotPayable(message)
            }

            OrderError::StaleIntent(_) => ServiceError::StaleIntent(message),

            OrderError::EmptyItems
            | OrderError::InvalidQuantity(_)
            | OrderError::LineTotalMismatch(_)
            | OrderError::TotalsInconsistent
            | OrderError::InvalidAddress { .. } => ServiceError::Validation(message),

            OrderError::WarrantyOutOfRange(_) | OrderError::AlreadyCreated | OrderError::NotInitialized => {
                ServiceError::internal(message)
            }
        }
    }
}

impl From<CommandError> for ServiceError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Domain(e) => e.into(),
            CommandError::NotFound(_) => ServiceError::order_not_found(),
            CommandError::ConcurrentModification(_) => ServiceError::ConcurrentModification(err.to_string()),
            CommandError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::internal(err)
    }
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Changed { .. } => ServiceError::ConcurrentModification(err.to_string()),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(_) => ServiceError::NotFound("Payment intent".to_string()),
            GatewayError::Rejected(ref reason) => {
                tracing::warn!(reason = %reason, "Gateway rejected request");
                ServiceError::OrderNotPayable(err.to_string())
            }
            other => ServiceError::GatewayUnavailable(other.to_string()),
        }
    }
}
