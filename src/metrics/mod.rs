// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::metrics_handler;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order lifecycle (creation, transitions, rejected commands, conflicts)
// - Payment intents and confirmations
// - Gateway calls, retry attempts and circuit breaker state
// - Warranty activation
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounterVec,
    pub order_transitions: IntCounterVec,
    pub commands_rejected: IntCounterVec,
    pub command_conflicts: IntCounter,

    // Payment Metrics
    pub payment_intents: IntCounterVec,
    pub payment_confirmations: IntCounterVec,

    // Gateway Metrics
    pub gateway_requests: IntCounterVec,
    pub gateway_request_duration: HistogramVec,
    pub retry_attempts_total: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
    pub circuit_breaker_transitions: IntCounterVec,

    // Warranty Metrics
    pub warranties_activated: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounterVec::new(
            Opts::new("orders_created_total", "Total orders created"),
            &["payment_method"],
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let commands_rejected = IntCounterVec::new(
            Opts::new("order_commands_rejected_total", "Order commands rejected by business rules"),
            &["command", "reason"],
        )?;
        registry.register(Box::new(commands_rejected.clone()))?;

        let command_conflicts = IntCounter::new(
            "order_command_conflicts_total",
            "Appends retried because another writer advanced the stream",
        )?;
        registry.register(Box::new(command_conflicts.clone()))?;

        // Payment Metrics
        let payment_intents = IntCounterVec::new(
            Opts::new("payment_intents_total", "Payment intent requests"),
            &["outcome"],
        )?;
        registry.register(Box::new(payment_intents.clone()))?;

        let payment_confirmations = IntCounterVec::new(
            Opts::new("payment_confirmations_total", "Payment confirmations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payment_confirmations.clone()))?;

        // Gateway Metrics
        let gateway_requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Calls made to payment gateways"),
            &["gateway", "operation", "outcome"],
        )?;
        registry.register(Box::new(gateway_requests.clone()))?;

        let gateway_request_duration = HistogramVec::new(
            HistogramOpts::new("gateway_request_duration_seconds", "Payment gateway call duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["gateway", "operation"],
        )?;
        registry.register(Box::new(gateway_request_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        // Warranty Metrics
        let warranties_activated = IntCounter::new(
            "warranty_lines_activated_total",
            "Order lines whose warranty was activated",
        )?;
        registry.register(Box::new(warranties_activated.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_transitions,
            commands_rejected,
            command_conflicts,
            payment_intents,
            payment_confirmations,
            gateway_requests,
            gateway_request_duration,
            retry_attempts_total,
            circuit_breaker_state,
            circuit_breaker_transitions,
            warranties_activated,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, payment_method: &str) {
        self.orders_created.with_label_values(&[payment_method]).inc();
    }

    pub fn record_transition(&self, from_status: &str, to_status: &str) {
        self.order_transitions.with_label_values(&[from_status, to_status]).inc();
    }

    pub fn record_rejected_command(&self, command: &str, reason: &str) {
        self.commands_rejected.with_label_values(&[command, reason]).inc();
    }

    pub fn record_payment_intent(&self, outcome: &str) {
        self.payment_intents.with_label_values(&[outcome]).inc();
    }

    pub fn record_warranties_activated(&self, lines: usize) {
        self.warranties_activated.inc_by(lines as u64);
    }

    pub fn record_payment_confirmation(&self, outcome: &str) {
        self.payment_confirmations.with_label_values(&[outcome]).inc();
    }

    /// Helper to record one gateway call
    pub fn record_gateway_call(&self, gateway: &str, operation: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.gateway_requests.with_label_values(&[gateway, operation, outcome]).inc();
        self.gateway_request_duration
            .with_label_values(&[gateway, operation])
            .observe(duration_secs);
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    /// Helper to update circuit breaker state
    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }

    /// Helper to record circuit breaker transition
    pub fn record_circuit_breaker_transition(&self, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions.with_label_values(&[from_state, to_state]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created("cod");
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("pending", "confirmed");
        metrics.record_transition("pending", "confirmed");

        let gathered = metrics.registry.gather();
        let transitions = gathered.iter().find(|m| m.name() == "order_transitions_total").unwrap();
        assert_eq!(transitions.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_record_gateway_call() {
        let metrics = Metrics::new().unwrap();
        metrics.record_gateway_call("stripe", "create_intent", 0.2, true);
        metrics.record_gateway_call("stripe", "create_intent", 0.3, false);

        let gathered = metrics.registry.gather();
        let calls = gathered.iter().find(|m| m.name() == "gateway_requests_total").unwrap();
        assert_eq!(calls.metric.len(), 2); // ok and error outcomes
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(0); // Closed
        metrics.record_circuit_breaker_transition("Closed", "Open");
        metrics.update_circuit_breaker_state(1); // Open

        let gathered = metrics.registry.gather();
        let state = gathered.iter().find(|m| m.name() == "circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
