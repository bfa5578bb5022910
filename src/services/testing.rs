use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::catalog::FixtureCatalog;
use crate::domain::cart::InMemoryCartStore;
use crate::domain::order::{Address, InMemoryOrderIndex, OrderAggregate, OrderEvent, PaymentMethod};
use crate::domain::pricing::AttributeSelection;
use crate::event_sourcing::InMemoryEventStore;
use crate::metrics::Metrics;
use crate::payments::{GatewayPolicy, GatewayRegistry, ResilientGateway, SimulatedGateway};
use crate::utils::{CircuitBreakerConfig, RetryConfig};
use super::{AddToCart, Backends, PlaceOrder, RequestContext, Services, StoreSettings};

pub(crate) const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/catalog.yaml");

pub(crate) const PHONE: Uuid = Uuid::from_u128(0x0b6f3c1e_8f3a_4c53_9a51_2f6d9a1c0001);
pub(crate) const PHONE_STANDARD: Uuid = Uuid::from_u128(0x0b6f3c1e_8f3a_4c53_9a51_2f6d9a1c0101);
pub(crate) const CABLE: Uuid = Uuid::from_u128(0x0b6f3c1e_8f3a_4c53_9a51_2f6d9a1c0003);
pub(crate) const CAPACITY: Uuid = Uuid::from_u128(0x7d1a5b2c_3e4f_4a6b_8c9d_0e1f2a3b0001);
pub(crate) const CAPACITY_256: Uuid = Uuid::from_u128(0x7d1a5b2c_3e4f_4a6b_8c9d_0e1f2a3b1001);
pub(crate) const CAPACITY_512: Uuid = Uuid::from_u128(0x7d1a5b2c_3e4f_4a6b_8c9d_0e1f2a3b1002);

pub(crate) fn catalog() -> Arc<FixtureCatalog> {
    Arc::new(FixtureCatalog::load(FIXTURE).unwrap())
}

pub(crate) fn capacity(value: Uuid) -> AttributeSelection {
    AttributeSelection::from([(CAPACITY, value)])
}

pub(crate) fn phone_line(quantity: i64) -> AddToCart {
    AddToCart {
        product_id: PHONE,
        variant_id: Some(PHONE_STANDARD),
        quantity,
        attribute_selection: capacity(CAPACITY_256),
    }
}

pub(crate) fn cable_line(quantity: i64) -> AddToCart {
    AddToCart {
        product_id: CABLE,
        variant_id: None,
        quantity,
        attribute_selection: AttributeSelection::new(),
    }
}

pub(crate) fn address() -> Address {
    Address {
        full_name: "Nguyen Van A".to_string(),
        phone: "+84901234567".to_string(),
        line1: "12 Ly Thuong Kiet".to_string(),
        line2: None,
        ward: Some("Hang Bai".to_string()),
        district: Some("Hoan Kiem".to_string()),
        city: "Ha Noi".to_string(),
        country: "VN".to_string(),
        postal_code: None,
    }
}

pub(crate) fn place_order(payment_method: PaymentMethod, coupon_code: Option<&str>) -> PlaceOrder {
    PlaceOrder {
        payment_method,
        notes: None,
        shipping_address: address(),
        billing_address: address(),
        coupon_code: coupon_code.map(str::to_string),
    }
}

/// Services over in-memory backends and a simulated gateway with fast retries
pub(crate) struct Harness {
    pub services: Services,
    pub gateway: Arc<SimulatedGateway>,
    pub metrics: Arc<Metrics>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_intent_ttl(StoreSettings::default().intent_ttl)
    }

    pub fn with_intent_ttl(intent_ttl: chrono::Duration) -> Self {
        let metrics = Arc::new(Metrics::new().unwrap());
        let gateway = Arc::new(SimulatedGateway::new());
        let policy = GatewayPolicy {
            timeout: Duration::from_secs(1),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: 20,
                timeout: Duration::from_secs(30),
                success_threshold: 1,
            },
        };
        let resilient = Arc::new(ResilientGateway::new(gateway.clone(), policy, metrics.clone()));
        let catalog = catalog();

        let backends = Backends {
            event_store: Arc::new(InMemoryEventStore::<OrderEvent>::new()),
            index: Arc::new(InMemoryOrderIndex::new()),
            carts: Arc::new(InMemoryCartStore::new()),
            catalog: catalog.clone(),
            coupons: catalog,
            gateways: GatewayRegistry::new()
                .register(PaymentMethod::Stripe, resilient.clone())
                .register(PaymentMethod::Vnpay, resilient),
        };
        let settings = StoreSettings {
            intent_ttl,
            ..StoreSettings::default()
        };

        Self {
            services: Services::new(backends, settings, metrics.clone()),
            gateway,
            metrics,
        }
    }
}

impl Deref for Harness {
    type Target = Services;

    fn deref(&self) -> &Services {
        &self.services
    }
}

pub(crate) async fn placed_order(h: &Harness, ctx: &RequestContext, method: PaymentMethod) -> OrderAggregate {
    h.cart.add_item(ctx, phone_line(1)).await.unwrap();
    h.checkout.place_order(ctx, place_order(method, None)).await.unwrap()
}
