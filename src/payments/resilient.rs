use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::health::{ComponentHealth, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, RetryConfig,
};
use super::gateway::{CreateIntentRequest, GatewayError, GatewayIntent, PaymentGateway};

// ============================================================================
// Resilient Gateway
// ============================================================================
//
// Every call: per-attempt timeout → circuit breaker → bounded retry with
// exponential backoff on transient errors. Callers see either the gateway's
// answer or a single `GatewayError` once the budget is spent.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

pub struct ResilientGateway {
    inner: Arc<dyn PaymentGateway>,
    policy: GatewayPolicy,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl ResilientGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, policy: GatewayPolicy, metrics: Arc<Metrics>) -> Self {
        let breaker = CircuitBreaker::new(policy.breaker.clone()).with_metrics(metrics.clone());
        Self {
            inner,
            policy,
            breaker,
            metrics,
        }
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let gateway = self.inner.name();
        let timeout = self.policy.timeout;

        retry_on_transient(self.policy.retry.clone(), |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt(operation, attempt);
            }
            let call = f();

            async move {
                let started = Instant::now();
                let bounded = async {
                    tokio::time::timeout(timeout, call)
                        .await
                        .unwrap_or(Err(GatewayError::Timeout(timeout)))
                };

                let result = match self.breaker.call(bounded).await {
                    Ok(value) => Ok(value),
                    Err(CircuitBreakerError::CircuitOpen) => Err(GatewayError::CircuitOpen),
                    Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
                };

                self.metrics.record_gateway_call(
                    gateway,
                    operation,
                    started.elapsed().as_secs_f64(),
                    result.is_ok(),
                );
                tracing::debug!(gateway, operation, attempt, ok = result.is_ok(), "Gateway call finished");

                result
            }
        })
        .await
        .into_result()
    }
}

#[async_trait]
impl PaymentGateway for ResilientGateway {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<GatewayIntent, GatewayError> {
        self.call("create_intent", || self.inner.create_intent(request)).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        self.call("retrieve_intent", || self.inner.retrieve_intent(intent_id)).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.call("cancel_intent", || self.inner.cancel_intent(intent_id)).await
    }

    async fn health(&self) -> ComponentHealth {
        let status = match self.breaker.get_state().await {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded("circuit breaker half-open".to_string()),
            CircuitState::Open => HealthStatus::Unhealthy("circuit breaker open".to_string()),
        };
        ComponentHealth::new(self.inner.name(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::SimulatedGateway;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    struct Stalled;

    #[async_trait]
    impl PaymentGateway for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn create_intent(&self, _request: &CreateIntentRequest) -> Result<GatewayIntent, GatewayError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(GatewayError::Unavailable("unreachable".to_string()))
        }

        async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
            Err(GatewayError::NotFound(intent_id.to_string()))
        }

        async fn cancel_intent(&self, _intent_id: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn policy(max_attempts: u32, failure_threshold: u32) -> GatewayPolicy {
        GatewayPolicy {
            timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
            breaker: CircuitBreakerConfig {
                failure_threshold,
                timeout: Duration::from_secs(30),
                success_threshold: 1,
            },
        }
    }

    fn request() -> CreateIntentRequest {
        CreateIntentRequest {
            order_id: Uuid::new_v4(),
            amount: Decimal::from(500),
            currency: "VND".to_string(),
            idempotency_key: "order-x-v1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let simulated = Arc::new(SimulatedGateway::new());
        simulated.fail_next(2);
        let gateway = ResilientGateway::new(simulated.clone(), policy(3, 10), Arc::new(Metrics::new().unwrap()));

        let intent = gateway.create_intent(&request()).await.unwrap();

        assert_eq!(simulated.created_count(), 1);
        assert!(intent.id.starts_with("sim_pi_"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_error() {
        let simulated = Arc::new(SimulatedGateway::new());
        simulated.fail_next(5);
        let gateway = ResilientGateway::new(simulated, policy(3, 10), Arc::new(Metrics::new().unwrap()));

        let err = gateway.create_intent(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_per_attempt() {
        let gateway = ResilientGateway::new(Arc::new(Stalled), policy(2, 10), Arc::new(Metrics::new().unwrap()));

        let err = gateway.create_intent(&request()).await.unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let simulated = Arc::new(SimulatedGateway::new());
        simulated.fail_next(2);
        let gateway = ResilientGateway::new(simulated.clone(), policy(2, 2), Arc::new(Metrics::new().unwrap()));

        assert!(gateway.create_intent(&request()).await.is_err());

        // The outage is over, but the breaker has not cooled down yet.
        let err = gateway.create_intent(&request()).await.unwrap_err();
        assert_eq!(err, GatewayError::CircuitOpen);
        assert_eq!(simulated.created_count(), 0);
        assert!(gateway.health().await.status.is_unhealthy());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let gateway = ResilientGateway::new(Arc::new(Stalled), policy(3, 10), Arc::new(Metrics::new().unwrap()));

        let err = gateway.retrieve_intent("pi_missing").await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("pi_missing".to_string()));
    }
}
