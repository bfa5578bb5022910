// ============================================================================
// Catalog Collaborators
// ============================================================================
//
// Products and coupons are owned by other parts of the storefront. The order
// lifecycle only reads them, through the `Catalog` and `CouponDirectory`
// traits. `FixtureCatalog` backs both from a YAML file for development and
// tests.
//
// ============================================================================

mod fixture;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::{AttributeGroup, Coupon};
use crate::domain::warranty::WarrantyPackage;

pub use fixture::{CatalogFixture, FixtureCatalog, FixtureError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Replaces the product base price when set
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub base_price: Decimal,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub attribute_groups: Vec<AttributeGroup>,
    #[serde(default)]
    pub warranty_package: Option<WarrantyPackage>,
}

impl Product {
    pub fn variant(&self, variant_id: Uuid) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Price before attribute adjustments for the chosen variant
    pub fn base_price_for(&self, variant: Option<&ProductVariant>) -> Decimal {
        variant.and_then(|v| v.price).unwrap_or(self.base_price)
    }

    pub fn sku_for(&self, variant: Option<&ProductVariant>) -> Option<String> {
        variant.and_then(|v| v.sku.clone()).or_else(|| self.sku.clone())
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: Uuid) -> Option<Product>;
}

#[async_trait]
pub trait CouponDirectory: Send + Sync {
    /// Lookup is case-insensitive on the code
    async fn find(&self, code: &str) -> Option<Coupon>;
}
