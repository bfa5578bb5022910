// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus, PaymentStatus, PaymentIntentRecord)
// - Events (OrderCreated, PaymentSucceeded, WarrantyActivated, etc.)
// - Commands (CreateOrder, ChangeStatus, RecordPaymentSuccess, etc.)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate with the status state machine)
// - Command Handler (OrderCommandHandler with conflict retry)
// - Index (per-customer read model for listing)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod index;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
pub use index::*;
