use std::sync::Arc;
use tokio::sync::Mutex;
use std::time::{Duration, Instant};

use crate::metrics::Metrics;
use super::retry::IsTransient;

// ============================================================================
// Circuit Breaker Pattern Implementation
// ============================================================================
//
// Tracks transient failures of a downstream service and temporarily blocks
// calls while it is unhealthy. A permanent error (the service answered, but
// said no) counts as the service being reachable.
//
// States:
// - Closed: Normal operation, requests pass through
// - Open: Too many failures, requests blocked immediately
// - HalfOpen: Testing if service recovered, limited requests allowed
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,     // Normal operation
    Open,       // Blocking requests
    HalfOpen,   // Testing recovery
}

impl CircuitState {
    fn gauge_value(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<CircuitBreakerState>>,
    config: CircuitBreakerConfig,
    metrics: Option<Arc<Metrics>>,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening circuit
    pub failure_threshold: u32,
    /// Time to wait before attempting recovery
    pub timeout: Duration,
    /// Number of successes needed to close circuit from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            })),
            config,
            metrics: None,
        }
    }

    /// Report state changes to the circuit breaker gauge and transition counter
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.update_circuit_breaker_state(CircuitState::Closed.gauge_value());
        self.metrics = Some(metrics);
        self
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: IsTransient,
    {
        // Check if circuit allows the call
        {
            let mut state = self.state.lock().await;

            if state.state == CircuitState::Open {
                let cooled_down = state
                    .last_failure_time
                    .map_or(true, |last_failure| last_failure.elapsed() >= self.config.timeout);

                if !cooled_down {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.success_count = 0;
            }
        }

        // Execute the operation
        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) if err.is_transient() => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
            Err(err) => {
                self.record_success().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        let from = state.state;
        if from == to {
            return;
        }

        state.state = to;
        match to {
            CircuitState::Open => tracing::warn!(failures = state.failure_count, "Circuit breaker opened"),
            CircuitState::HalfOpen => tracing::info!("Circuit breaker transitioning to HalfOpen"),
            CircuitState::Closed => tracing::info!("Circuit breaker closed"),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_circuit_breaker_transition(from.label(), to.label());
            metrics.update_circuit_breaker_state(to.gauge_value());
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.last_failure_time = None;
                }
            }
            CircuitState::Closed => {
                // Reset failure count on success
                state.failure_count = 0;
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
                tracing::debug!("Success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Failure during half-open, reopening circuit");
                self.transition(&mut state, CircuitState::Open);
                state.success_count = 0;
            }
            CircuitState::Open => {
                // Already open, just update the time
            }
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        let state = self.state.lock().await;
        state.state
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "Circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}
