// ============================================================================
// Application Services
// ============================================================================
//
// Use cases on top of the domain: each takes the caller's `RequestContext`,
// enforces who may do what, drives the command handler and records metrics.
// HTTP handlers are thin wrappers around these.
//
// ============================================================================

pub mod cart;
pub mod checkout;
pub mod context;
pub mod errors;
pub mod orders;
pub mod payments;
pub mod warranty;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::catalog::{Catalog, CouponDirectory};
use crate::domain::cart::CartStore;
use crate::domain::order::{OrderCommandHandler, OrderEvent, OrderIndex};
use crate::domain::pricing::PricingPolicy;
use crate::event_sourcing::EventStore;
use crate::metrics::Metrics;
use crate::payments::GatewayRegistry;

pub use cart::{AddToCart, CartService};
pub use checkout::{CheckoutService, PlaceOrder, Quote, QuoteRequest};
pub use context::{RequestContext, Role};
pub use errors::ServiceError;
pub use orders::{OrderPage, OrderService, ReasonRequest, UpdateStatus};
pub use payments::{ConfirmPayment, CreateIntent, IntentHandle, PaymentCoordinator, DEFAULT_INTENT_TTL_MINUTES};
pub use warranty::WarrantyActivator;

/// Storage and collaborators the services run against
pub struct Backends {
    pub event_store: Arc<dyn EventStore<OrderEvent>>,
    pub index: Arc<dyn OrderIndex>,
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn Catalog>,
    pub coupons: Arc<dyn CouponDirectory>,
    pub gateways: GatewayRegistry,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub pricing: PricingPolicy,
    pub currency: String,
    pub intent_ttl: chrono::Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            currency: "VND".to_string(),
            intent_ttl: chrono::Duration::minutes(DEFAULT_INTENT_TTL_MINUTES),
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub payments: PaymentCoordinator,
    pub warranty: WarrantyActivator,
}

impl Services {
    pub fn new(backends: Backends, settings: StoreSettings, metrics: Arc<Metrics>) -> Self {
        let handler = OrderCommandHandler::new(backends.event_store, metrics.clone());

        Self {
            cart: CartService::new(backends.carts.clone(), backends.catalog.clone()),
            checkout: CheckoutService::new(
                backends.carts,
                backends.catalog,
                backends.coupons,
                handler.clone(),
                backends.index.clone(),
                settings.pricing,
                settings.currency,
                metrics.clone(),
            ),
            orders: OrderService::new(handler.clone(), backends.index, metrics.clone()),
            payments: PaymentCoordinator::new(handler.clone(), backends.gateways, settings.intent_ttl, metrics.clone()),
            warranty: WarrantyActivator::new(handler, metrics),
        }
    }
}
