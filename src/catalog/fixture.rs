use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::pricing::Coupon;
use crate::domain::warranty::MAX_WARRANTY_MONTHS;
use super::{Catalog, CouponDirectory, Product};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("Duplicate product id: {0}")]
    DuplicateProduct(Uuid),

    #[error("Duplicate coupon code: {0}")]
    DuplicateCoupon(String),

    #[error("Product {product} offers a {months}-month warranty, allowed range is 1 to {max}")]
    InvalidWarranty { product: Uuid, months: u32, max: u32 },
}

/// On-disk shape of a catalog fixture
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

impl CatalogFixture {
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }
}

/// Read-only catalog and coupon directory built from a fixture
#[derive(Debug, Default)]
pub struct FixtureCatalog {
    products: HashMap<Uuid, Product>,
    coupons: HashMap<String, Coupon>,
}

impl FixtureCatalog {
    pub fn from_fixture(fixture: CatalogFixture) -> Result<Self, FixtureError> {
        let mut catalog = Self::default();

        for product in fixture.products {
            if catalog.products.contains_key(&product.id) {
                return Err(FixtureError::DuplicateProduct(product.id));
            }
            if let Some(package) = product.warranty_package.as_ref().filter(|p| !p.has_valid_duration()) {
                return Err(FixtureError::InvalidWarranty {
                    product: product.id,
                    months: package.duration_months,
                    max: MAX_WARRANTY_MONTHS,
                });
            }
            catalog.products.insert(product.id, product);
        }

        for coupon in fixture.coupons {
            let key = coupon.code.to_uppercase();
            if catalog.coupons.contains_key(&key) {
                return Err(FixtureError::DuplicateCoupon(coupon.code));
            }
            catalog.coupons.insert(key, coupon);
        }

        tracing::info!(
            products = catalog.products.len(),
            coupons = catalog.coupons.len(),
            "Catalog fixture loaded"
        );
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_fixture(CatalogFixture::load(path)?)
    }
}

#[async_trait]
impl Catalog for FixtureCatalog {
    async fn product(&self, product_id: Uuid) -> Option<Product> {
        self.products.get(&product_id).cloned()
    }
}

#[async_trait]
impl CouponDirectory for FixtureCatalog {
    async fn find(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(&code.trim().to_uppercase()).cloned()
    }
}
