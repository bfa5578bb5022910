use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::gateway::{CreateIntentRequest, GatewayError, GatewayIntent, GatewayIntentStatus, PaymentGateway};

// ============================================================================
// Simulated Gateway - in-process, for development and tests
// ============================================================================

#[derive(Default)]
struct Ledger {
    intents: HashMap<String, GatewayIntent>,
    by_idempotency_key: HashMap<String, String>,
}

#[derive(Default)]
pub struct SimulatedGateway {
    ledger: Mutex<Ledger>,
    /// Pending intents succeed the first time they are retrieved
    auto_capture: bool,
    injected_failures: AtomicU32,
    created: AtomicU32,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_capturing() -> Self {
        Self {
            auto_capture: true,
            ..Self::default()
        }
    }

    /// Make the next `count` calls fail with a transient error
    pub fn fail_next(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Number of distinct intents created so far
    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub async fn mark_succeeded(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.settle(intent_id, GatewayIntentStatus::Succeeded, None).await
    }

    pub async fn mark_failed(&self, intent_id: &str, reason: &str) -> Result<(), GatewayError> {
        self.settle(intent_id, GatewayIntentStatus::Failed, Some(reason.to_string())).await
    }

    pub async fn status_of(&self, intent_id: &str) -> Option<GatewayIntentStatus> {
        self.ledger.lock().await.intents.get(intent_id).map(|intent| intent.status)
    }

    async fn settle(
        &self,
        intent_id: &str,
        status: GatewayIntentStatus,
        reason: Option<String>,
    ) -> Result<(), GatewayError> {
        let mut ledger = self.ledger.lock().await;
        let intent = ledger
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;

        intent.status = status;
        intent.failure_reason = reason;
        Ok(())
    }

    fn injected_failure(&self) -> Result<(), GatewayError> {
        let remaining = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match remaining {
            Ok(_) => Err(GatewayError::Unavailable("simulated outage".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<GatewayIntent, GatewayError> {
        self.injected_failure()?;
        let mut ledger = self.ledger.lock().await;

        if let Some(existing) = ledger
            .by_idempotency_key
            .get(&request.idempotency_key)
            .and_then(|id| ledger.intents.get(id))
        {
            return Ok(existing.clone());
        }

        let id = format!("sim_pi_{}", Uuid::new_v4().simple());
        let intent = GatewayIntent {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id: id.clone(),
            order_ref: Some(request.order_id),
            amount: request.amount,
            currency: request.currency.clone(),
            status: GatewayIntentStatus::Pending,
            failure_reason: None,
        };

        ledger.by_idempotency_key.insert(request.idempotency_key.clone(), id.clone());
        ledger.intents.insert(id, intent.clone());
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        self.injected_failure()?;
        let mut ledger = self.ledger.lock().await;
        let intent = ledger
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;

        if self.auto_capture && intent.status == GatewayIntentStatus::Pending {
            intent.status = GatewayIntentStatus::Succeeded;
        }

        Ok(intent.clone())
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.injected_failure()?;
        let mut ledger = self.ledger.lock().await;
        let intent = ledger
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;

        match intent.status {
            GatewayIntentStatus::Pending | GatewayIntentStatus::Failed => {
                intent.status = GatewayIntentStatus::Canceled;
                Ok(())
            }
            GatewayIntentStatus::Canceled => Ok(()),
            GatewayIntentStatus::Succeeded => {
                Err(GatewayError::Rejected(format!("intent {intent_id} has already succeeded")))
            }
        }
    }
}
