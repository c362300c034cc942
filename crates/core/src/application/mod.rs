// Application Layer - Queue runtime and use cases

pub mod constants;
pub mod engine;
pub mod identity;
pub mod outbound;
pub mod persistence;
pub mod retry;
pub mod tracker;

// Re-exports
pub use engine::{CompletionOutcome, Dispatch, EnqueueOutcome, QueueEngine};
pub use identity::AnonymousIdentity;
pub use outbound::OutOfBandReporter;
pub use persistence::BufferPersistence;
pub use retry::{RetryDecision, RetryPolicy};
pub use tracker::{shutdown_channel, EventTracker, ShutdownSender, ShutdownToken};
