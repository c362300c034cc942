// Queue Health Snapshot

use super::event::ItemStatus;
use serde::{Deserialize, Serialize};

/// Item counts broken down by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub waiting: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Pending => self.pending += 1,
            ItemStatus::Processing => self.processing += 1,
            ItemStatus::Waiting => self.waiting += 1,
            ItemStatus::Failed => self.failed += 1,
        }
    }
}

/// Point-in-time health of a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_size: usize,
    pub max_queue_size: usize,
    pub capacity_percent: f64,
    pub in_flight: usize,
    /// Age of the oldest buffered item (0 when empty)
    pub oldest_item_age_ms: i64,
    pub status_counts: StatusCounts,
}

impl QueueStats {
    /// Whether there is anything worth reporting
    pub fn is_active(&self) -> bool {
        self.queue_size > 0 || self.in_flight > 0
    }

    /// Out-of-band payload sent to the collector
    pub fn to_report(&self, timestamp: String) -> serde_json::Value {
        serde_json::json!({
            "type": "queue_health",
            "timestamp": timestamp,
            "queue_size": self.queue_size,
            "max_queue_size": self.max_queue_size,
            "capacity_percent": self.capacity_percent,
            "in_flight": self.in_flight,
            "oldest_item_age_ms": self.oldest_item_age_ms,
            "status_counts": self.status_counts,
        })
    }
}
