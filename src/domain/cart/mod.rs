// ============================================================================
// Cart Domain
// ============================================================================
//
// Per-customer line items and the store that serializes their mutation.
// `CartSnapshot` is the only thing that crosses into order creation.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod store;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use store::*;
