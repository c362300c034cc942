//! Queue engine - the synchronous state machine behind the tracker
//!
//! Owns the buffer and the in-flight counter. Every mutation (enqueue, dispatch,
//! completion, retry wake-up, pruning) is a plain method call, so the runtime can
//! sequence them from a single task and tests can drive them without timers.

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{
    ClassificationTable, EventBuffer, EventPayload, ItemId, ItemStatus, PruneReport, QueueConfig,
    QueueItem, QueueStats,
};
use tracing::{debug, warn};

/// A delivery the runtime must perform
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub item_id: ItemId,
    pub payload: serde_json::Value,
}

/// Side effects of one enqueue
#[derive(Debug, Default)]
pub struct EnqueueOutcome {
    pub pruned: Option<PruneReport>,
    pub evicted: Option<QueueItem>,
    /// Eager persistence threshold reached
    pub persist_due: bool,
}

/// Result of applying a delivery completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Item delivered and removed from the buffer
    Delivered,
    /// Item is waiting; wake it up after `delay_ms`
    Retry { delay_ms: u64 },
    /// Retry cap reached, item kept as failed
    Failed,
    /// Item no longer buffered (pruned or evicted mid-flight); slot released only
    Untracked,
}

pub struct QueueEngine {
    config: QueueConfig,
    classifier: ClassificationTable,
    retry_policy: RetryPolicy,
    buffer: EventBuffer,
    in_flight: usize,
    enqueued_since_persist: usize,
}

impl QueueEngine {
    pub fn new(config: QueueConfig, classifier: ClassificationTable) -> Self {
        Self {
            retry_policy: RetryPolicy::from_config(&config),
            buffer: EventBuffer::new(config.max_queue_size),
            config,
            classifier,
            in_flight: 0,
            enqueued_since_persist: 0,
        }
    }

    /// Replace the buffer with items restored from a previous session
    pub fn restore(&mut self, mut items: Vec<QueueItem>) {
        for item in &mut items {
            item.reset_after_restore();
        }
        self.buffer = EventBuffer::from_items(items, self.config.max_queue_size);
        self.in_flight = 0;
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Buffer a new event: prune, evict at the hard cap, classify, append
    pub fn enqueue(
        &mut self,
        id: impl Into<String>,
        event_type: &str,
        payload: EventPayload,
        enqueued_at: i64,
    ) -> EnqueueOutcome {
        let pruned = self.prune();

        let priority = self.classifier.classify(event_type);
        let item = QueueItem::new(id, event_type, payload, priority, enqueued_at);
        let evicted = self.buffer.push(item);

        self.enqueued_since_persist += 1;
        let persist_due =
            self.config.persist_every > 0 && self.enqueued_since_persist >= self.config.persist_every;
        if persist_due {
            self.enqueued_since_persist = 0;
        }

        EnqueueOutcome {
            pruned,
            evicted,
            persist_due,
        }
    }

    /// Priority-aware pruning pass
    pub fn prune(&mut self) -> Option<PruneReport> {
        let report = self.buffer.prune()?;
        warn!(
            size_before = report.size_before,
            size_after = report.size_after,
            removed_low = report.removed_low,
            removed_medium = report.removed_medium,
            "Queue pruned"
        );
        Some(report)
    }

    /// Claim the next pending item if a concurrency slot is free
    pub fn next_dispatch(&mut self) -> Option<Dispatch> {
        if self.in_flight >= self.config.max_concurrent_requests {
            return None;
        }
        let item = self.buffer.next_pending_mut()?;
        if let Err(e) = item.start() {
            warn!(item_id = %item.id, error = %e, "Cannot dispatch item");
            return None;
        }
        self.in_flight += 1;
        Some(Dispatch {
            item_id: item.id.clone(),
            payload: item.payload.to_value(),
        })
    }

    /// Claim pending items until the concurrency cap is reached or none are left
    pub fn drain_dispatchable(&mut self) -> Vec<Dispatch> {
        std::iter::from_fn(|| self.next_dispatch()).collect()
    }

    pub fn on_delivered(&mut self, id: &str) -> CompletionOutcome {
        self.release_slot();
        match self.buffer.remove(id) {
            Some(item) => {
                debug!(item_id = %id, event_type = %item.event_type, "Event delivered");
                CompletionOutcome::Delivered
            }
            None => CompletionOutcome::Untracked,
        }
    }

    pub fn on_delivery_failed(&mut self, id: &str, now_millis: i64) -> CompletionOutcome {
        self.release_slot();
        let Some(item) = self.buffer.get_mut(id) else {
            return CompletionOutcome::Untracked;
        };
        match self.retry_policy.on_failure(item, now_millis) {
            Ok(RetryDecision::Retry(delay_ms)) => CompletionOutcome::Retry { delay_ms },
            Ok(RetryDecision::Failed) => CompletionOutcome::Failed,
            Err(e) => {
                warn!(item_id = %id, error = %e, "Ignoring failure for item not in flight");
                CompletionOutcome::Untracked
            }
        }
    }

    /// Retry timer fired. Returns true if the item went back to pending.
    pub fn on_retry_due(&mut self, id: &str) -> bool {
        match self.buffer.get_mut(id) {
            Some(item) if item.status == ItemStatus::Waiting => item.ready_for_retry().is_ok(),
            _ => false,
        }
    }

    /// Drop every terminally failed item
    pub fn purge_failed(&mut self) -> usize {
        self.buffer.remove_failed()
    }

    pub fn mark_persisted(&mut self) {
        self.enqueued_since_persist = 0;
    }

    pub fn stats(&self, now_millis: i64) -> QueueStats {
        let capacity = self.buffer.capacity();
        let capacity_percent = if capacity == 0 {
            0.0
        } else {
            (self.buffer.len() as f64 / capacity as f64 * 1000.0).round() / 10.0
        };
        QueueStats {
            queue_size: self.buffer.len(),
            max_queue_size: capacity,
            capacity_percent,
            in_flight: self.in_flight,
            oldest_item_age_ms: self
                .buffer
                .oldest_enqueued_at()
                .map_or(0, |oldest| (now_millis - oldest).max(0)),
            status_counts: self.buffer.status_counts(),
        }
    }

    fn release_slot(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventData, Priority};

    fn config(max_queue_size: usize) -> QueueConfig {
        QueueConfig {
            max_queue_size,
            retry_jitter_ms: 0,
            ..Default::default()
        }
    }

    fn engine(max_queue_size: usize) -> QueueEngine {
        QueueEngine::new(config(max_queue_size), ClassificationTable::default())
    }

    fn payload(event_type: &str) -> EventPayload {
        EventPayload::new(event_type, "ts".to_string(), "anon", EventData::new())
    }

    fn track(engine: &mut QueueEngine, id: &str, event_type: &str) -> EnqueueOutcome {
        engine.enqueue(id, event_type, payload(event_type), 0)
    }

    #[test]
    fn test_enqueue_classifies_and_buffers() {
        let mut engine = engine(1000);
        track(&mut engine, "a", "page_view");

        let item = engine.buffer().get("a").unwrap();
        assert_eq!(item.priority, Priority::Low);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.retry_count, 0);
    }

    #[test]
    fn test_delivery_removes_item() {
        let mut engine = engine(1000);
        track(&mut engine, "a", "page_view");

        let dispatch = engine.next_dispatch().unwrap();
        assert_eq!(dispatch.payload["event_type"], "page_view");
        assert_eq!(engine.in_flight(), 1);

        assert_eq!(engine.on_delivered("a"), CompletionOutcome::Delivered);
        assert!(engine.buffer().is_empty());
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_high_dispatched_before_medium() {
        let mut engine = engine(1000);
        track(&mut engine, "m", "tab_switch");
        track(&mut engine, "h", "job_saved");

        assert_eq!(engine.next_dispatch().unwrap().item_id, "h");
        assert_eq!(engine.next_dispatch().unwrap().item_id, "m");
    }

    #[test]
    fn test_concurrency_cap() {
        let mut engine = engine(1000);
        for i in 0..10 {
            track(&mut engine, &format!("e{}", i), "tab_switch");
        }

        let batch = engine.drain_dispatchable();
        assert_eq!(batch.len(), 3);
        assert_eq!(engine.buffer().count_by_status(ItemStatus::Processing), 3);
        assert!(engine.next_dispatch().is_none());

        engine.on_delivered(&batch[0].item_id);
        assert_eq!(engine.drain_dispatchable().len(), 1);
        assert_eq!(engine.buffer().count_by_status(ItemStatus::Processing), 3);
    }

    #[test]
    fn test_hard_cap_evicts_index_zero() {
        let mut engine = engine(5);
        // High priority items are never pruned, so only hard-cap eviction applies
        for i in 0..5 {
            track(&mut engine, &format!("h{}", i), "job_saved");
        }
        assert_eq!(engine.buffer().len(), 5);

        let outcome = track(&mut engine, "h5", "job_saved");
        assert_eq!(outcome.evicted.unwrap().id, "h0");
        assert_eq!(engine.buffer().len(), 5);
        assert!(!engine.buffer().contains("h0"));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut engine = engine(50);
        let names = ["job_saved", "tab_switch", "page_view", "unknown_event"];
        for i in 0..500 {
            track(&mut engine, &format!("e{}", i), names[i % names.len()]);
            assert!(engine.buffer().len() <= 50);
        }
    }

    #[test]
    fn test_prune_keeps_high_priority_job_saved() {
        let mut engine = engine(1000);
        track(&mut engine, "saved", "job_saved");
        for i in 0..900 {
            // Bypass the pre-insert prune to build the over-threshold buffer first
            let item = QueueItem::new(
                format!("s{}", i),
                "scroll_depth",
                payload("scroll_depth"),
                Priority::Low,
                0,
            );
            engine.buffer.push(item);
        }

        let report = engine.prune().unwrap();
        assert!(report.removed_low >= 720);
        assert!(engine.buffer().contains("saved"));
        assert_eq!(engine.buffer().len(), 1);
    }

    #[test]
    fn test_retry_then_success() {
        let mut engine = engine(1000);
        track(&mut engine, "a", "job_saved");
        let mut retries = 0;

        for _ in 0..2 {
            engine.next_dispatch().unwrap();
            match engine.on_delivery_failed("a", 0) {
                CompletionOutcome::Retry { .. } => retries += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
            assert!(engine.next_dispatch().is_none(), "waiting items are not dispatched");
            assert!(engine.on_retry_due("a"));
        }

        engine.next_dispatch().unwrap();
        assert_eq!(engine.on_delivered("a"), CompletionOutcome::Delivered);
        assert_eq!(retries, 2);
        assert!(engine.buffer().is_empty());
    }

    #[test]
    fn test_retry_cap_marks_failed_and_keeps_item() {
        let mut engine = engine(1000);
        track(&mut engine, "a", "job_saved");

        for attempt in 1..=5 {
            engine.next_dispatch().unwrap();
            let outcome = engine.on_delivery_failed("a", 0);
            if attempt < 5 {
                assert!(matches!(outcome, CompletionOutcome::Retry { .. }));
                engine.on_retry_due("a");
            } else {
                assert_eq!(outcome, CompletionOutcome::Failed);
            }
        }

        let item = engine.buffer().get("a").unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.retry_count, 5);
        assert!(engine.next_dispatch().is_none());
        assert!(!engine.on_retry_due("a"));
    }

    #[test]
    fn test_backoff_grows_per_attempt() {
        let mut engine = engine(1000);
        track(&mut engine, "a", "job_saved");
        let mut delays = Vec::new();

        for _ in 0..4 {
            engine.next_dispatch().unwrap();
            if let CompletionOutcome::Retry { delay_ms } = engine.on_delivery_failed("a", 0) {
                delays.push(delay_ms);
            }
            engine.on_retry_due("a");
        }

        assert_eq!(delays, vec![4000, 8000, 16_000, 32_000]);
    }

    #[test]
    fn test_completion_for_pruned_item_releases_slot() {
        let mut engine = engine(10);
        for i in 0..3 {
            track(&mut engine, &format!("low{}", i), "page_view");
        }
        let batch = engine.drain_dispatchable();
        assert_eq!(engine.in_flight(), 3);

        engine.buffer.remove(&batch[0].item_id);
        assert_eq!(
            engine.on_delivery_failed(&batch[0].item_id, 0),
            CompletionOutcome::Untracked
        );
        assert_eq!(engine.in_flight(), 2);
        assert!(!engine.on_retry_due(&batch[0].item_id));
    }

    #[test]
    fn test_persist_due_every_n() {
        let mut engine = engine(1000);
        let due: Vec<bool> = (0..20)
            .map(|i| track(&mut engine, &format!("e{}", i), "tab_switch").persist_due)
            .collect();
        assert_eq!(due.iter().filter(|d| **d).count(), 2);
        assert!(due[9] && due[19]);
    }

    #[test]
    fn test_restore_resets_in_flight_items() {
        let mut original = engine(1000);
        track(&mut original, "a", "job_saved");
        track(&mut original, "b", "job_saved");
        original.drain_dispatchable();
        let items = original.buffer().items().to_vec();

        let mut restored = engine(1000);
        restored.restore(items);
        assert_eq!(restored.buffer().count_by_status(ItemStatus::Pending), 2);
        assert_eq!(restored.in_flight(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut engine = engine(10);
        engine.enqueue("a", "job_saved", payload("job_saved"), 1000);
        engine.enqueue("b", "tab_switch", payload("tab_switch"), 3000);
        engine.next_dispatch();

        let stats = engine.stats(6000);
        assert_eq!(stats.queue_size, 2);
        assert_eq!(stats.capacity_percent, 20.0);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.oldest_item_age_ms, 5000);
        assert_eq!(stats.status_counts.processing, 1);
        assert_eq!(stats.status_counts.pending, 1);
    }
}
