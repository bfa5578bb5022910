// ============================================================================
// Pricing Domain
// ============================================================================
//
// Attribute-adjusted unit prices, coupon eligibility and order totals.
// Everything here is side-effect free.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod resolver;

pub use value_objects::*;
pub use errors::*;
pub use resolver::*;
