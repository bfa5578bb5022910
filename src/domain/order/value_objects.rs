use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::AttributeSelection;
use crate::domain::warranty::{WarrantyPackage, WarrantyStatus};

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipping,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    /// The single forward step of the fulfilment chain.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Statuses in which an online payment may still be taken.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Stripe,
    Vnpay,
}

impl PaymentMethod {
    /// Paid through a third-party gateway rather than on delivery.
    pub fn is_online(&self) -> bool {
        !matches!(self, PaymentMethod::Cod)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Vnpay => "vnpay",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub ward: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Address {
    /// Name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total_price: Decimal,
    #[serde(default)]
    pub attribute_selection: AttributeSelection,
    pub warranty_package: Option<WarrantyPackage>,
    pub warranty_start_at: Option<DateTime<Utc>>,
    pub warranty_end_at: Option<DateTime<Utc>>,
    pub warranty_status: Option<WarrantyStatus>,
    pub imei: Option<String>,
}

/// The order's single confirmable gateway intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRecord {
    pub gateway_intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

impl PaymentIntentRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now < self.issued_at + ttl
    }
}

/// Human-facing order reference, assigned once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("ORD-{}-{}", at.format("%Y%m%d"), &random[..10]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_forward_chain() {
        let mut status = OrderStatus::Pending;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            seen.push(next);
            status = next;
        }

        assert_eq!(
            seen,
            vec![
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipping,
                OrderStatus::Completed,
            ]
        );
        assert!(status.is_terminal());
    }

    #[test]
    fn test_cancellable_statuses() {
        let cancellable: Vec<OrderStatus> = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipping,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ]
        .into_iter()
        .filter(OrderStatus::can_cancel)
        .collect();

        assert_eq!(cancellable, vec![OrderStatus::Pending, OrderStatus::Confirmed]);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&OrderStatus::Shipping).unwrap(), "\"shipping\"");
        let parsed: PaymentMethod = serde_json::from_str("\"vnpay\"").unwrap();
        assert_eq!(parsed, PaymentMethod::Vnpay);
        assert!(parsed.is_online());
        assert!(!PaymentMethod::Cod.is_online());
    }

    #[test]
    fn test_address_missing_field() {
        let mut address = Address {
            full_name: "Nguyen Van A".to_string(),
            phone: "0901234567".to_string(),
            line1: "1 Le Loi".to_string(),
            line2: None,
            ward: None,
            district: Some("District 1".to_string()),
            city: "Ho Chi Minh City".to_string(),
            country: "VN".to_string(),
            postal_code: None,
        };
        assert_eq!(address.missing_field(), None);

        address.phone = "  ".to_string();
        assert_eq!(address.missing_field(), Some("phone"));
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let number = OrderNumber::generate(at);

        assert!(number.as_str().starts_with("ORD-20240502-"));
        assert_eq!(number.as_str().len(), "ORD-20240502-".len() + 10);
        assert_ne!(number, OrderNumber::generate(at));
    }

    #[test]
    fn test_intent_freshness() {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let intent = PaymentIntentRecord {
            gateway_intent_id: "pi_1".to_string(),
            client_secret: "pi_1_secret".to_string(),
            amount: Decimal::from(100),
            currency: "VND".to_string(),
            issued_at,
        };
        let ttl = chrono::Duration::minutes(30);

        assert!(intent.is_fresh(issued_at + chrono::Duration::minutes(29), ttl));
        assert!(!intent.is_fresh(issued_at + chrono::Duration::minutes(30), ttl));
    }
}
