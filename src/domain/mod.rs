// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure business rules, separate from HTTP and storage:
// - pricing: attribute-adjusted prices, coupons, order totals
// - cart: per-customer lines and the store that serializes their mutation
// - order: the event-sourced order aggregate and its command handler
// - warranty: warranty packages and coverage windows
//
// ============================================================================

pub mod pricing;
pub mod cart;
pub mod order;
pub mod warranty;
