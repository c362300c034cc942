//! Event buffer - ordered, capacity-bounded sequence of queue items
//!
//! Insertion order is significant: dispatch is FIFO within a priority tier and
//! hard-cap eviction always drops the item at index 0.

use super::event::{ItemStatus, Priority, QueueItem};
use super::stats::StatusCounts;

/// Soft threshold (percent of capacity) above which low priority items are pruned
pub const PRUNE_LOW_THRESHOLD_PERCENT: usize = 80;

/// Soft threshold (percent of capacity) above which medium priority items are pruned
pub const PRUNE_MEDIUM_THRESHOLD_PERCENT: usize = 90;

/// Outcome of a pruning pass that removed at least one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub size_before: usize,
    pub size_after: usize,
    pub removed_low: usize,
    pub removed_medium: usize,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.removed_low + self.removed_medium
    }
}

#[derive(Debug, Clone)]
pub struct EventBuffer {
    items: Vec<QueueItem>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    /// Rebuild a buffer from restored items, keeping the newest `capacity` of them
    pub fn from_items(mut items: Vec<QueueItem>, capacity: usize) -> Self {
        if items.len() > capacity {
            items.drain(..items.len() - capacity);
        }
        Self { items, capacity }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Append an item, evicting the oldest one when the buffer is full.
    ///
    /// Returns the evicted item, if any.
    pub fn push(&mut self, item: QueueItem) -> Option<QueueItem> {
        let evicted = if self.items.len() >= self.capacity && !self.items.is_empty() {
            Some(self.items.remove(0))
        } else {
            None
        };
        self.items.push(item);
        evicted
    }

    /// Remove an item by ID
    pub fn remove(&mut self, id: &str) -> Option<QueueItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Priority-aware pruning.
    ///
    /// Above 80% capacity every low item is dropped (whatever its status). If the
    /// buffer is still above 90% afterwards, every medium item is dropped too.
    pub fn prune(&mut self) -> Option<PruneReport> {
        let size_before = self.items.len();
        let mut removed_low = 0;
        let mut removed_medium = 0;

        if self.above_threshold(PRUNE_LOW_THRESHOLD_PERCENT) {
            removed_low = self.remove_priority(Priority::Low);
        }
        if self.above_threshold(PRUNE_MEDIUM_THRESHOLD_PERCENT) {
            removed_medium = self.remove_priority(Priority::Medium);
        }

        if removed_low + removed_medium == 0 {
            return None;
        }
        Some(PruneReport {
            size_before,
            size_after: self.items.len(),
            removed_low,
            removed_medium,
        })
    }

    fn above_threshold(&self, percent: usize) -> bool {
        self.items.len() * 100 > self.capacity * percent
    }

    fn remove_priority(&mut self, priority: Priority) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.priority != priority);
        before - self.items.len()
    }

    /// Select the next pending item: first high, else first medium, else first pending
    pub fn next_pending_mut(&mut self) -> Option<&mut QueueItem> {
        let index = self
            .first_pending_with(Some(Priority::High))
            .or_else(|| self.first_pending_with(Some(Priority::Medium)))
            .or_else(|| self.first_pending_with(None))?;
        self.items.get_mut(index)
    }

    fn first_pending_with(&self, priority: Option<Priority>) -> Option<usize> {
        self.items.iter().position(|item| {
            item.status == ItemStatus::Pending && priority.map_or(true, |p| item.priority == p)
        })
    }

    /// Drop every terminally failed item. Returns the number removed.
    pub fn remove_failed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.status != ItemStatus::Failed);
        before - self.items.len()
    }

    pub fn count_by_status(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in &self.items {
            counts.record(item.status);
        }
        counts
    }

    pub fn oldest_enqueued_at(&self) -> Option<i64> {
        self.items.iter().map(|item| item.enqueued_at).min()
    }
}
