// Retry logic: exponential backoff with jitter, capped attempts
use crate::domain::{QueueConfig, QueueItem};
use rand::Rng;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the item (after the given delay in ms)
    Retry(u64),
    /// Do not retry, item has failed permanently
    Failed,
}

/// Retry policy
///
/// Determines what happens to an item after a failed delivery based on:
/// - Current retry count
/// - Maximum retries allowed
/// - Exponential backoff capped at a maximum delay, plus random jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_retries` - Failed attempts before the item is marked failed
    /// * `base_delay_ms` - Base delay in milliseconds (default: 2000)
    /// * `max_delay_ms` - Ceiling of the un-jittered delay (default: 60000)
    /// * `jitter_ms` - Upper bound of the random jitter (default: 1000)
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter_ms,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay_ms,
            config.max_retry_delay_ms,
            config.retry_jitter_ms,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Un-jittered delay for a retry count
    ///
    /// Backoff formula:
    /// delay = min(base_delay * 2^retry_count, max_delay)
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        2u64.checked_pow(retry_count)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .map_or(self.max_delay_ms, |delay| delay.min(self.max_delay_ms))
    }

    /// Backoff delay plus jitter in `0..=jitter_ms` to avoid thundering-herd retries
    pub fn retry_delay_ms(&self, retry_count: u32) -> u64 {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        self.backoff_delay_ms(retry_count) + jitter
    }

    /// Record a failed delivery attempt on an in-flight item
    ///
    /// Increments the retry count, then either schedules a retry (item becomes
    /// `waiting`) or marks the item `failed` once the count reaches the cap.
    ///
    /// # Example
    /// ```text
    /// match policy.on_failure(&mut item, now)? {
    ///     RetryDecision::Retry(delay_ms) => schedule_retry(item.id, delay_ms),
    ///     RetryDecision::Failed => {}
    /// }
    /// ```
    pub fn on_failure(
        &self,
        item: &mut QueueItem,
        now_millis: i64,
    ) -> crate::domain::error::Result<RetryDecision> {
        item.retry_count = item.retry_count.saturating_add(1);

        if item.retry_count >= self.max_retries {
            warn!(
                item_id = %item.id,
                event_type = %item.event_type,
                retry_count = item.retry_count,
                max_retries = self.max_retries,
                "Max retry attempts reached, item marked failed"
            );
            item.fail();
            return Ok(RetryDecision::Failed);
        }

        let delay_ms = self.retry_delay_ms(item.retry_count);
        item.wait_for_retry(now_millis + delay_ms as i64)?;

        info!(
            item_id = %item.id,
            retry_count = item.retry_count,
            max_retries = self.max_retries,
            delay_ms = delay_ms,
            "Scheduling retry"
        );

        Ok(RetryDecision::Retry(delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventData, EventPayload, ItemStatus, Priority};

    fn processing_item() -> QueueItem {
        let payload = EventPayload::new("job_saved", "ts".to_string(), "anon", EventData::new());
        let mut item = QueueItem::new("item-1", "job_saved", payload, Priority::High, 0);
        item.start().unwrap();
        item
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 2000, 60_000, 0);
        assert_eq!(policy.backoff_delay_ms(0), 2000);
        assert_eq!(policy.backoff_delay_ms(1), 4000);
        assert_eq!(policy.backoff_delay_ms(4), 32_000);
        assert_eq!(policy.backoff_delay_ms(5), 60_000);
        assert_eq!(policy.backoff_delay_ms(200), 60_000);
    }

    #[test]
    fn test_backoff_monotonic_with_jitter() {
        let policy = RetryPolicy::new(10, 2000, 60_000, 1000);
        for k in 0..20 {
            let next = policy.retry_delay_ms(k + 1);
            assert!(next >= policy.backoff_delay_ms(k));
            assert!(next <= policy.backoff_delay_ms(k + 1) + 1000);
        }
    }

    #[test]
    fn test_on_failure_schedules_retry() {
        let policy = RetryPolicy::new(5, 2000, 60_000, 0);
        let mut item = processing_item();

        let decision = policy.on_failure(&mut item, 10_000).unwrap();
        assert_eq!(decision, RetryDecision::Retry(4000));
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.status, ItemStatus::Waiting);
        assert_eq!(item.next_retry_at, Some(14_000));
    }

    #[test]
    fn test_on_failure_reaches_cap() {
        let policy = RetryPolicy::new(5, 2000, 60_000, 0);
        let mut item = processing_item();

        for _ in 0..4 {
            assert!(matches!(
                policy.on_failure(&mut item, 0).unwrap(),
                RetryDecision::Retry(_)
            ));
            item.ready_for_retry().unwrap();
            item.start().unwrap();
        }

        assert_eq!(policy.on_failure(&mut item, 0).unwrap(), RetryDecision::Failed);
        assert_eq!(item.retry_count, 5);
        assert_eq!(item.status, ItemStatus::Failed);
    }
}
