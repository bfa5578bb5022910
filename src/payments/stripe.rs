use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use super::gateway::{
    from_minor_units, to_minor_units, CreateIntentRequest, GatewayError, GatewayIntent, GatewayIntentStatus,
    PaymentGateway,
};

// ============================================================================
// Stripe Payment Intents over REST
// ============================================================================

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
const ORDER_METADATA_KEY: &str = "order_id";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
}

pub struct StripeGateway {
    config: StripeConfig,
    http: Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn read_intent(response: reqwest::Response, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, intent_id, text));
        }

        let intent: StripeIntent = response.json().await.map_err(transport)?;
        Ok(intent.into_gateway_intent())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<GatewayIntent, GatewayError> {
        let amount = to_minor_units(request.amount, &request.currency)?;
        let form = [
            ("amount", amount.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("metadata[order_id]", request.order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .http
            .post(self.url("payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(transport)?;

        Self::read_intent(response, "new").await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("payment_intents/{intent_id}")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(transport)?;

        Self::read_intent(response, intent_id).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(self.url(&format!("payment_intents/{intent_id}/cancel")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(transport)?;

        Self::read_intent(response, intent_id).await.map(|_| ())
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Unavailable(err.to_string())
}

fn classify_status(status: StatusCode, intent_id: &str, body: String) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(intent_id.to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GatewayError::Unavailable(format!("status {status}"))
    } else {
        let message = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(body);
        GatewayError::Rejected(format!("status {status}: {message}"))
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    last_payment_error: Option<StripeErrorDetail>,
}

impl StripeIntent {
    fn status(&self) -> GatewayIntentStatus {
        match self.status.as_str() {
            "succeeded" => GatewayIntentStatus::Succeeded,
            "canceled" => GatewayIntentStatus::Canceled,
            "requires_payment_method" if self.last_payment_error.is_some() => GatewayIntentStatus::Failed,
            _ => GatewayIntentStatus::Pending,
        }
    }

    fn into_gateway_intent(self) -> GatewayIntent {
        let status = self.status();
        let currency = self.currency.to_uppercase();
        let failure_reason = self
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.code.clone()));

        GatewayIntent {
            order_ref: self.metadata.get(ORDER_METADATA_KEY).and_then(|id| Uuid::parse_str(id).ok()),
            amount: from_minor_units(self.amount, &currency),
            currency,
            client_secret: self.client_secret.unwrap_or_default(),
            status,
            failure_reason,
            id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn intent(json: &str) -> GatewayIntent {
        serde_json::from_str::<StripeIntent>(json).unwrap().into_gateway_intent()
    }

    #[test]
    fn test_succeeded_intent_mapping() {
        let order_id = Uuid::new_v4();
        let mapped = intent(&format!(
            r#"{{"id":"pi_1","amount":45990000,"currency":"vnd","client_secret":"pi_1_secret",
                "status":"succeeded","metadata":{{"order_id":"{order_id}"}}}}"#
        ));

        assert_eq!(mapped.status, GatewayIntentStatus::Succeeded);
        assert_eq!(mapped.order_ref, Some(order_id));
        assert_eq!(mapped.amount, Decimal::from(45_990_000));
        assert_eq!(mapped.currency, "VND");
    }

    #[test]
    fn test_declined_intent_is_failed() {
        let mapped = intent(
            r#"{"id":"pi_2","amount":1999,"currency":"usd","status":"requires_payment_method",
                "last_payment_error":{"code":"card_declined","message":"Your card was declined."}}"#,
        );

        assert_eq!(mapped.status, GatewayIntentStatus::Failed);
        assert_eq!(mapped.failure_reason.as_deref(), Some("Your card was declined."));
        assert_eq!(mapped.order_ref, None);
    }

    #[test]
    fn test_awaiting_customer_is_pending() {
        for status in ["requires_payment_method", "requires_action", "processing", "requires_confirmation"] {
            let mapped = intent(&format!(
                r#"{{"id":"pi_3","amount":100,"currency":"vnd","status":"{status}"}}"#
            ));
            assert_eq!(mapped.status, GatewayIntentStatus::Pending, "{status}");
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "pi_x", String::new()),
            GatewayError::NotFound("pi_x".to_string())
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "pi_x", String::new()),
            GatewayError::Unavailable(_)
        ));
        assert_eq!(
            classify_status(
                StatusCode::BAD_REQUEST,
                "pi_x",
                r#"{"error":{"message":"Amount must be positive"}}"#.to_string()
            ),
            GatewayError::Rejected("status 400 Bad Request: Amount must be positive".to_string())
        );
    }
}
