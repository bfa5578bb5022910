use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::catalog::{Catalog, Product, ProductVariant};
use crate::domain::cart::{clamp_quantity, Cart, CartError, CartItem, CartLineKey, CartStore};
use crate::domain::pricing::{resolve_price, AttributeSelection};
use super::context::RequestContext;
use super::errors::ServiceError;

// ============================================================================
// Cart Service
// ============================================================================
//
// Prices are always resolved here from the catalog. A client only names the
// product, variant and attribute choices it wants.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    #[serde(default = "one")]
    pub quantity: i64,
    #[serde(default)]
    pub attribute_selection: AttributeSelection,
}

fn one() -> i64 {
    1
}

/// Resolve the product and variant a line refers to.
pub(crate) async fn lookup(
    catalog: &dyn Catalog,
    key: &CartLineKey,
) -> Result<(Product, Option<ProductVariant>), CartError> {
    let product = catalog
        .product(key.product_id)
        .await
        .ok_or(CartError::UnknownProduct(key.product_id))?;

    let variant = match key.variant_id {
        Some(variant_id) => Some(product.variant(variant_id).cloned().ok_or(CartError::UnknownVariant {
            product: product.id,
            variant: variant_id,
        })?),
        None if !product.variants.is_empty() => return Err(CartError::VariantRequired(product.id)),
        None => None,
    };

    Ok((product, variant))
}

pub(crate) fn line_name(product: &Product, variant: Option<&ProductVariant>) -> String {
    match variant {
        Some(v) => format!("{} ({})", product.name, v.name),
        None => product.name.clone(),
    }
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { carts, catalog }
    }

    pub async fn get(&self, ctx: &RequestContext) -> Cart {
        self.carts.get(ctx.user_id).await
    }

    pub async fn add_item(&self, ctx: &RequestContext, request: AddToCart) -> Result<Cart, ServiceError> {
        let key = CartLineKey {
            product_id: request.product_id,
            variant_id: request.variant_id,
            attribute_selection: request.attribute_selection,
        };

        let (product, variant) = lookup(self.catalog.as_ref(), &key).await?;
        let price = resolve_price(
            product.base_price_for(variant.as_ref()),
            &product.attribute_groups,
            &key.attribute_selection,
            None,
        )?;

        let quantity = clamp_quantity(request.quantity);
        let item = CartItem::new(key, line_name(&product, variant.as_ref()), quantity, price.unit_price);

        tracing::debug!(
            user_id = %ctx.user_id,
            product_id = %product.id,
            quantity,
            unit_price = %price.unit_price,
            "Adding item to cart"
        );

        Ok(self.carts.add_item(ctx.user_id, item).await)
    }

    pub async fn update_quantity(
        &self,
        ctx: &RequestContext,
        key: &CartLineKey,
        quantity: i64,
    ) -> Result<Cart, ServiceError> {
        Ok(self.carts.update_quantity(ctx.user_id, key, clamp_quantity(quantity)).await?)
    }

    pub async fn remove_item(&self, ctx: &RequestContext, key: &CartLineKey) -> Result<Cart, ServiceError> {
        Ok(self.carts.remove_item(ctx.user_id, key).await?)
    }

    pub async fn clear(&self, ctx: &RequestContext) -> Cart {
        self.carts.clear(ctx.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::InMemoryCartStore;
    use crate::services::testing::{self, capacity, PHONE, PHONE_STANDARD, CAPACITY_256, CAPACITY_512};
    use rust_decimal::Decimal;

    fn service() -> CartService {
        CartService::new(Arc::new(InMemoryCartStore::new()), testing::catalog())
    }

    fn request(selection: AttributeSelection, quantity: i64) -> AddToCart {
        AddToCart {
            product_id: PHONE,
            variant_id: Some(PHONE_STANDARD),
            quantity,
            attribute_selection: selection,
        }
    }

    #[tokio::test]
    async fn test_price_is_resolved_server_side() {
        let service = service();
        let ctx = RequestContext::customer(Uuid::new_v4());

        let cart = service
            .add_item(&ctx, request(capacity(CAPACITY_512), 2))
            .await
            .unwrap();

        assert_eq!(cart.items[0].unit_price, Decimal::from(24_990_000));
        assert_eq!(cart.items[0].line_total, Decimal::from(49_980_000));
        assert_eq!(cart.items[0].name, "Galaxy Note 14 (Standard)");
    }

    #[tokio::test]
    async fn test_quantity_is_clamped() {
        let service = service();
        let ctx = RequestContext::customer(Uuid::new_v4());

        let cart = service
            .add_item(&ctx, request(capacity(CAPACITY_256), 5_000))
            .await
            .unwrap();
        assert_eq!(cart.items[0].quantity, 999);

        let key = cart.items[0].key();
        let cart = service.update_quantity(&ctx, &key, 0).await.unwrap();
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_unknown_product_and_missing_required_attribute() {
        let service = service();
        let ctx = RequestContext::customer(Uuid::new_v4());

        let mut unknown = request(AttributeSelection::new(), 1);
        unknown.product_id = Uuid::new_v4();
        assert_eq!(service.add_item(&ctx, unknown).await.unwrap_err().code(), "validation_error");

        let missing = request(AttributeSelection::new(), 1);
        assert_eq!(service.add_item(&ctx, missing).await.unwrap_err().code(), "validation_error");
    }

    #[tokio::test]
    async fn test_variant_required_when_product_has_variants() {
        let service = service();
        let ctx = RequestContext::customer(Uuid::new_v4());

        let mut no_variant = request(capacity(CAPACITY_256), 1);
        no_variant.variant_id = None;

        assert_eq!(
            service.add_item(&ctx, no_variant).await.unwrap_err(),
            ServiceError::Validation(CartError::VariantRequired(PHONE).to_string())
        );
    }
}
