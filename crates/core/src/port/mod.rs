// Port Layer - Interfaces for external dependencies

pub mod event_collector;
pub mod id_provider; // For deterministic testing
pub mod key_value_store;
pub mod time_provider;

// Re-exports
pub use event_collector::{DeliveryError, EventCollector};
pub use id_provider::IdProvider;
pub use key_value_store::KeyValueStore;
pub use time_provider::TimeProvider;
