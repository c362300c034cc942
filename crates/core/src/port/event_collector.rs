// Event Collector Port
// Remote ingestion sink: accepts a JSON payload, reports success or failure only

use async_trait::async_trait;
use thiserror::Error;

/// Delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Collector rejected payload with status {0}")]
    Status(u16),

    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Event Collector trait
///
/// Implementations:
/// - HttpCollector (infra-http): POSTs the payload as JSON
/// - MockCollector: scripted outcomes for tests
#[async_trait]
pub trait EventCollector: Send + Sync {
    /// Deliver one payload. No response body is inspected.
    async fn send(&self, payload: &serde_json::Value) -> Result<(), DeliveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock collector behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Fail the first N calls, then succeed
        FailTimes(usize),
        /// Never resolve (hung transport)
        Hang,
    }

    /// Mock collector recording every payload it receives
    pub struct MockCollector {
        behavior: Arc<Mutex<MockBehavior>>,
        sent: Arc<Mutex<Vec<serde_json::Value>>>,
        failures: Arc<Mutex<usize>>,
    }

    impl MockCollector {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                sent: Arc::new(Mutex::new(Vec::new())),
                failures: Arc::new(Mutex::new(0)),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        /// Every payload received, including failed attempts
        pub fn sent(&self) -> Vec<serde_json::Value> {
            self.sent.lock().unwrap().clone()
        }
        pub fn call_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
        pub fn failure_count(&self) -> usize {
            *self.failures.lock().unwrap()
        }
        /// Payloads whose `type` field equals `kind` (out-of-band reports)
        pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
            self.sent()
                .into_iter()
                .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some(kind))
                .collect()
        }
    }

    #[async_trait]
    impl EventCollector for MockCollector {
        async fn send(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(payload.clone());

            let behavior = self.behavior.lock().unwrap().clone();
            let outcome = match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(DeliveryError::Transport(msg)),
                MockBehavior::FailTimes(remaining) => {
                    if remaining > 0 {
                        *self.behavior.lock().unwrap() = MockBehavior::FailTimes(remaining - 1);
                        Err(DeliveryError::Status(503))
                    } else {
                        Ok(())
                    }
                }
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            };
            if outcome.is_err() {
                *self.failures.lock().unwrap() += 1;
            }
            outcome
        }
    }
}
