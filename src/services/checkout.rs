use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, CouponDirectory};
use crate::domain::cart::{CartError, CartSnapshot, CartStore};
use crate::domain::order::{
    Address, OrderAggregate, OrderCommand, OrderCommandHandler, OrderIndex, OrderIndexEntry, OrderItem,
    OrderNumber, PaymentMethod, MAX_CONFLICT_RETRIES,
};
use crate::domain::pricing::{coupon_discount, resolve_price, CouponSelection, OrderTotals, PricingPolicy};
use crate::metrics::Metrics;
use super::cart::{line_name, lookup};
use super::context::RequestContext;
use super::errors::ServiceError;

// ============================================================================
// Checkout - cart snapshot → durable order
// ============================================================================
//
// Lines are re-priced from the catalog at checkout so the order never trusts
// a price captured earlier. The cart is consumed before the order stream is
// created and restored if creation fails; only the snapshotted quantities
// leave the cart.
//
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub currency: String,
    /// Set only when the coupon actually applies to this cart
    pub coupon_code: Option<String>,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
    coupons: Arc<dyn CouponDirectory>,
    orders: OrderCommandHandler,
    index: Arc<dyn OrderIndex>,
    policy: PricingPolicy,
    currency: String,
    metrics: Arc<Metrics>,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn Catalog>,
        coupons: Arc<dyn CouponDirectory>,
        orders: OrderCommandHandler,
        index: Arc<dyn OrderIndex>,
        policy: PricingPolicy,
        currency: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            carts,
            catalog,
            coupons,
            orders,
            index,
            policy,
            currency: currency.into(),
            metrics,
        }
    }

    pub async fn quote(&self, ctx: &RequestContext, request: QuoteRequest) -> Result<Quote, ServiceError> {
        let snapshot = self.carts.snapshot(ctx.user_id).await;
        self.price(&snapshot, request.coupon_code.as_deref()).await
    }

    pub async fn place_order(&self, ctx: &RequestContext, request: PlaceOrder) -> Result<OrderAggregate, ServiceError> {
        let (snapshot, quote) = self.claim_cart(ctx, request.coupon_code.as_deref()).await?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let command = OrderCommand::CreateOrder {
            order_number: OrderNumber::generate(now),
            customer_id: ctx.user_id,
            payment_method: request.payment_method,
            items: quote.items,
            totals: quote.totals,
            currency: quote.currency,
            coupon_code: quote.coupon_code,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        };

        let outcome = match self.orders.create(order_id, command, ctx.correlation_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.carts.restore(&snapshot).await;
                return Err(e.into());
            }
        };
        let order = outcome.order;

        let entry = OrderIndexEntry {
            order_id,
            customer_id: order.customer_id,
            order_number: order.order_number.clone(),
            created_at: order.created_at,
        };
        if let Err(e) = self.index.record(entry).await {
            tracing::error!(order_id = %order_id, error = %e, "Order created but not indexed for listing");
        }

        self.metrics.record_order_created(&order.payment_method.to_string());

        tracing::info!(
            order_id = %order_id,
            order_number = %order.order_number,
            customer_id = %order.customer_id,
            total = %order.totals.total_amount,
            payment_method = %order.payment_method,
            "Order placed"
        );

        Ok(order)
    }

    /// Snapshot, price and consume the cart in one step. A cart that changed
    /// between snapshot and consumption is priced again from scratch, so two
    /// checkouts of the same cart cannot both take its lines.
    async fn claim_cart(
        &self,
        ctx: &RequestContext,
        coupon_code: Option<&str>,
    ) -> Result<(CartSnapshot, Quote), ServiceError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let snapshot = self.carts.snapshot(ctx.user_id).await;
            let quote = self.price(&snapshot, coupon_code).await?;

            match self.carts.consume(&snapshot).await {
                Ok(_) => return Ok((snapshot, quote)),
                Err(CartError::Changed { expected, actual }) => {
                    tracing::debug!(
                        customer_id = %ctx.user_id,
                        attempt,
                        expected,
                        actual,
                        "Cart changed during checkout, pricing it again"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::ConcurrentModification(
            "Cart kept changing during checkout, please retry".to_string(),
        ))
    }

    async fn price(&self, snapshot: &CartSnapshot, coupon_code: Option<&str>) -> Result<Quote, ServiceError> {
        if snapshot.is_empty() {
            return Err(ServiceError::Validation("Cart is empty".to_string()));
        }

        let mut items = Vec::with_capacity(snapshot.items.len());
        for cart_item in &snapshot.items {
            let key = cart_item.key();
            let (product, variant) = lookup(self.catalog.as_ref(), &key).await?;
            let price = resolve_price(
                product.base_price_for(variant.as_ref()),
                &product.attribute_groups,
                &key.attribute_selection,
                None,
            )?;

            items.push(OrderItem {
                product_id: product.id,
                variant_id: key.variant_id,
                name: line_name(&product, variant.as_ref()),
                sku: product.sku_for(variant.as_ref()),
                unit_price: price.unit_price,
                quantity: cart_item.quantity,
                total_price: price.unit_price * Decimal::from(cart_item.quantity),
                attribute_selection: key.attribute_selection,
                warranty_package: product.warranty_package.clone(),
                warranty_start_at: None,
                warranty_end_at: None,
                warranty_status: None,
                imei: None,
            });
        }

        let subtotal: Decimal = items.iter().map(|item| item.total_price).sum();
        let selection = self.select_coupon(coupon_code).await?;
        let applied = selection
            .current()
            .filter(|coupon| coupon_discount(subtotal, coupon).eligible);

        Ok(Quote {
            totals: self.policy.order_totals(subtotal, applied),
            coupon_code: applied.map(|coupon| coupon.code.clone()),
            currency: self.currency.clone(),
            items,
        })
    }

    async fn select_coupon(&self, code: Option<&str>) -> Result<CouponSelection, ServiceError> {
        let mut selection = CouponSelection::none();
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(selection);
        };

        let coupon = self
            .coupons
            .find(code)
            .await
            .ok_or_else(|| ServiceError::Validation(format!("Unknown coupon code: {code}")))?;
        selection.select(coupon);
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, PageRequest};
    use crate::services::testing::{self, Harness, PHONE_STANDARD};

    #[tokio::test]
    async fn test_place_order_prices_from_catalog_and_snapshots_warranty() {
        let h = Harness::new();
        let ctx = RequestContext::customer(Uuid::new_v4());
        h.cart.add_item(&ctx, testing::phone_line(1)).await.unwrap();
        h.cart.add_item(&ctx, testing::cable_line(2)).await.unwrap();

        let order = h.checkout.place_order(&ctx, testing::place_order(PaymentMethod::Cod, None)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].variant_id, Some(PHONE_STANDARD));
        assert_eq!(order.items[0].unit_price, Decimal::from(21_990_000));
        assert_eq!(order.items[0].sku.as_deref(), Some("GN14"));
        assert_eq!(order.items[0].warranty_package.as_ref().map(|p| p.duration_months), Some(12));
        assert!(order.items[1].warranty_package.is_none());
        assert_eq!(order.totals.subtotal, Decimal::from(22_370_000));
        assert!(order.order_number.as_str().starts_with("ORD-"));
        assert!(h.cart.get(&ctx).await.is_empty());
    }

    #[tokio::test]
    async fn test_placed_order_is_listed_for_customer() {
        let h = Harness::new();
        let ctx = RequestContext::customer(Uuid::new_v4());
        h.cart.add_item(&ctx, testing::cable_line(1)).await.unwrap();

        let order = h.checkout.place_order(&ctx, testing::place_order(PaymentMethod::Cod, None)).await.unwrap();
        let page = h.orders.list(&ctx, PageRequest::new(None, None)).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.orders[0].id, order.id);
    }

    #[tokio::test]
    async fn test_coupon_applies_only_when_eligible() {
        let h = Harness::new();
        let ctx = RequestContext::customer(Uuid::new_v4());
        h.cart.add_item(&ctx, testing::cable_line(1)).await.unwrap();

        let below_minimum = h
            .checkout
            .quote(&ctx, QuoteRequest { coupon_code: Some("save10".to_string()) })
            .await
            .unwrap();
        assert_eq!(below_minimum.totals.discount_amount, Decimal::ZERO);
        assert_eq!(below_minimum.coupon_code, None);

        h.cart.add_item(&ctx, testing::phone_line(1)).await.unwrap();
        let capped = h
            .checkout
            .quote(&ctx, QuoteRequest { coupon_code: Some("SAVE10".to_string()) })
            .await
            .unwrap();
        assert_eq!(capped.totals.discount_amount, Decimal::from(500_000));
        assert_eq!(capped.totals.total_amount, Decimal::from(21_680_000));
        assert_eq!(capped.coupon_code.as_deref(), Some("SAVE10"));
    }

    #[tokio::test]
    async fn test_empty_cart_and_unknown_coupon_are_rejected() {
        let h = Harness::new();
        let ctx = RequestContext::customer(Uuid::new_v4());

        let empty = h.checkout.place_order(&ctx, testing::place_order(PaymentMethod::Cod, None)).await;
        assert_eq!(empty.unwrap_err(), ServiceError::Validation("Cart is empty".to_string()));

        h.cart.add_item(&ctx, testing::cable_line(1)).await.unwrap();
        let unknown = h
            .checkout
            .quote(&ctx, QuoteRequest { coupon_code: Some("NOPE".to_string()) })
            .await;
        assert_eq!(unknown.unwrap_err().code(), "validation_error");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_of_one_cart_create_one_order() {
        let h = Harness::new();

        for _ in 0..50 {
            let ctx = RequestContext::customer(Uuid::new_v4());
            h.cart.add_item(&ctx, testing::cable_line(1)).await.unwrap();

            let attempts: Vec<_> = [ctx, ctx]
                .into_iter()
                .map(|ctx| {
                    let checkout = h.checkout.clone();
                    tokio::spawn(async move {
                        checkout.place_order(&ctx, testing::place_order(PaymentMethod::Cod, None)).await
                    })
                })
                .collect();

            let mut placed = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => placed += 1,
                    Err(e) => assert_eq!(e, ServiceError::Validation("Cart is empty".to_string())),
                }
            }

            assert_eq!(placed, 1);
            let page = h.orders.list(&ctx, PageRequest::new(None, None)).await.unwrap();
            assert_eq!(page.total, 1);
            assert!(h.cart.get(&ctx).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_address_leaves_cart_untouched() {
        let h = Harness::new();
        let ctx = RequestContext::customer(Uuid::new_v4());
        h.cart.add_item(&ctx, testing::cable_line(1)).await.unwrap();

        let mut request = testing::place_order(PaymentMethod::Cod, None);
        request.shipping_address.city = String::new();

        assert_eq!(h.checkout.place_order(&ctx, request).await.unwrap_err().code(), "validation_error");
        assert_eq!(h.cart.get(&ctx).await.items.len(), 1);
    }
}
