// ============================================================================
// Payments - gateway clients
// ============================================================================
//
// `PaymentGateway` is the contract with a third-party gateway. Stripe talks
// REST; the simulated gateway lives in-process. `ResilientGateway` wraps any
// of them with timeout, retry and circuit breaking, and `GatewayRegistry`
// picks the gateway for an order's payment method.
//
// ============================================================================

pub mod gateway;
pub mod resilient;
pub mod simulated;
pub mod stripe;

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::order::PaymentMethod;

pub use gateway::*;
pub use resilient::{GatewayPolicy, ResilientGateway};
pub use simulated::SimulatedGateway;
pub use stripe::{StripeConfig, StripeGateway};

#[derive(Default, Clone)]
pub struct GatewayRegistry {
    by_method: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, method: PaymentMethod, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.by_method.insert(method, gateway);
        self
    }

    pub fn for_method(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.by_method.get(&method).cloned()
    }

    /// Each registered gateway once, even when it serves several methods
    pub fn distinct(&self) -> Vec<Arc<dyn PaymentGateway>> {
        let mut gateways: Vec<Arc<dyn PaymentGateway>> = Vec::new();
        for gateway in self.by_method.values() {
            if !gateways.iter().any(|known| Arc::ptr_eq(known, gateway)) {
                gateways.push(gateway.clone());
            }
        }
        gateways
    }
}
