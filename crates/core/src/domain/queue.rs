// Queue Configuration Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue configuration (all fields have defaults)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Dispatch tick interval
    pub processing_interval_ms: u64,
    /// Failed attempts before an item becomes terminally failed
    pub max_retries: u32,
    /// Concurrency cap for in-flight deliveries
    pub max_concurrent_requests: usize,
    pub retry_base_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Upper bound of the random jitter added to each retry delay
    pub retry_jitter_ms: u64,
    pub persistence_interval_ms: u64,
    /// Hard capacity ceiling of the buffer
    pub max_queue_size: usize,
    /// Eager persistence every N buffered events
    pub persist_every: usize,
    pub health_report_interval_ms: u64,
    /// Minimum gap between two system alerts of the same kind
    pub alert_cooldown_ms: u64,
    /// Per-attempt delivery timeout
    pub request_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            processing_interval_ms: 1000,
            max_retries: 5,
            max_concurrent_requests: 3,
            retry_base_delay_ms: 2000,
            max_retry_delay_ms: 60_000,
            retry_jitter_ms: 1000,
            persistence_interval_ms: 30_000,
            max_queue_size: 1000,
            persist_every: 10,
            health_report_interval_ms: 5 * 60 * 1000,
            alert_cooldown_ms: 60 * 60 * 1000,
            request_timeout_ms: 10_000,
        }
    }
}

impl QueueConfig {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_millis(self.processing_interval_ms)
    }

    pub fn persistence_interval(&self) -> Duration {
        Duration::from_millis(self.persistence_interval_ms)
    }

    pub fn health_report_interval(&self) -> Duration {
        Duration::from_millis(self.health_report_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(DomainError::ValidationError(
                "max_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(DomainError::ValidationError(
                "max_concurrent_requests must be greater than 0".to_string(),
            ));
        }
        if self.processing_interval_ms == 0 || self.health_report_interval_ms == 0 {
            return Err(DomainError::ValidationError(
                "timer intervals must be greater than 0".to_string(),
            ));
        }
        if self.retry_base_delay_ms > self.max_retry_delay_ms {
            return Err(DomainError::ValidationError(format!(
                "retry_base_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.retry_base_delay_ms, self.max_retry_delay_ms
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(DomainError::ValidationError(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
