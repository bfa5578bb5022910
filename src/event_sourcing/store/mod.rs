// ============================================================================
// Event Sourcing Store - Persistence Layer
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod scylla_store;

pub use event_store::{load_aggregate, EventStore, StoreError};
pub use memory::InMemoryEventStore;
pub use scylla_store::{ensure_event_schema, ScyllaEventStore};
