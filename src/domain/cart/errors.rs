use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("No cart line for product {0} with that variant and attribute selection")]
    LineNotFound(Uuid),

    #[error("Unknown product: {0}")]
    UnknownProduct(Uuid),

    #[error("Product {product} has no variant {variant}")]
    UnknownVariant { product: Uuid, variant: Uuid },

    #[error("Product {0} must be ordered as one of its variants")]
    VariantRequired(Uuid),

    #[error("Cart changed since revision {expected} (now {actual})")]
    Changed { expected: u64, actual: u64 },
}
