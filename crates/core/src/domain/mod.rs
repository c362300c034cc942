// Domain Layer - Pure business logic and entities

pub mod alert;
pub mod buffer;
pub mod classification;
pub mod error;
pub mod event;
pub mod queue;
pub mod stats;

// Re-exports
pub use alert::{AlertCooldown, AlertKind, SystemAlert};
pub use buffer::{EventBuffer, PruneReport};
pub use classification::{ClassificationRule, ClassificationTable};
pub use error::DomainError;
pub use event::{EventData, EventPayload, ItemId, ItemStatus, Priority, QueueItem};
pub use queue::QueueConfig;
pub use stats::{QueueStats, StatusCounts};
