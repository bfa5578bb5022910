use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::health::{ComponentHealth, HealthStatus};
use crate::utils::IsTransient;

// ============================================================================
// Payment Gateway Contract
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayIntentStatus {
    /// Awaiting customer action or still processing
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

/// An intent as the gateway reports it
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayIntent {
    pub id: String,
    /// Order the intent was created for, read back from gateway metadata
    pub order_ref: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub client_secret: String,
    pub status: GatewayIntentStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    /// Repeating a request with the same key yields the same intent
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Payment gateway circuit breaker is open")]
    CircuitOpen,

    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Payment intent {0} not found at the gateway")]
    NotFound(String),
}

impl IsTransient for GatewayError {
    fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<GatewayIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError>;

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError>;

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::new(self.name(), HealthStatus::Healthy)
    }
}

// ============================================================================
// Minor-unit conversion
// ============================================================================

/// ISO 4217 currencies that gateways charge without a fractional part.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV", "XAF",
    "XOF", "XPF",
];

pub fn currency_exponent(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.iter().any(|c| c.eq_ignore_ascii_case(currency)) {
        0
    } else {
        2
    }
}

/// Amount in the currency's smallest unit; fractions below it are rejected
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, GatewayError> {
    let scaled = amount * Decimal::from(10_i64.pow(currency_exponent(currency)));

    if scaled.fract() != Decimal::ZERO || scaled < Decimal::ZERO {
        return Err(GatewayError::Rejected(format!(
            "{amount} {currency} is not representable in minor units"
        )));
    }

    i64::try_from(scaled).map_err(|_| GatewayError::Rejected(format!("{amount} {currency} is out of range")))
}

pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, currency_exponent(currency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_zero_decimal_currency_round_trip() {
        let amount = Decimal::from(45_990_000);
        assert_eq!(to_minor_units(amount, "VND").unwrap(), 45_990_000);
        assert_eq!(to_minor_units(amount, "vnd").unwrap(), 45_990_000);
        assert_eq!(from_minor_units(45_990_000, "VND"), amount);
    }

    #[test]
    fn test_two_decimal_currency() {
        let amount = Decimal::from_str("19.99").unwrap();
        assert_eq!(to_minor_units(amount, "USD").unwrap(), 1999);
        assert_eq!(from_minor_units(1999, "usd"), amount);
    }

    #[test]
    fn test_sub_unit_amount_rejected() {
        let amount = Decimal::from_str("100.5").unwrap();
        assert!(matches!(to_minor_units(amount, "VND"), Err(GatewayError::Rejected(_))));
    }

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Unavailable("503".into()).is_transient());
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!GatewayError::CircuitOpen.is_transient());
        assert!(!GatewayError::Rejected("bad".into()).is_transient());
        assert!(!GatewayError::NotFound("pi".into()).is_transient());
    }
}
