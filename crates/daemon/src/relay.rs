//! Stdin relay: one JSON object per line, `{"event": "<type>", "data": {...}}`

use pulse_core::domain::{EventData, QueueStats};
use pulse_core::EventTracker;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize, PartialEq)]
pub struct InboundEvent {
    pub event: String,
    #[serde(default)]
    pub data: EventData,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> serde_json::Result<Option<InboundEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Hand one input line to the tracker. Returns true if an event was tracked.
pub fn forward(tracker: &EventTracker, line: &str) -> bool {
    match parse_line(line) {
        Ok(Some(inbound)) => {
            debug!(event_type = %inbound.event, "Relaying event");
            tracker.track_event(&inbound.event, inbound.data)
        }
        Ok(None) => false,
        Err(e) => {
            warn!(error = %e, "Skipping malformed input line");
            false
        }
    }
}

/// Items that can still be delivered (everything except `failed`)
fn outstanding(stats: &QueueStats) -> usize {
    stats.queue_size.saturating_sub(stats.status_counts.failed)
}

/// Wait until nothing deliverable is left in the queue, or until `timeout`
pub async fn wait_for_drain(tracker: &EventTracker, timeout: Duration) -> pulse_core::Result<QueueStats> {
    let deadline = Instant::now() + timeout;
    loop {
        let stats = tracker.stats().await?;
        let remaining = outstanding(&stats);
        if remaining == 0 {
            info!(failed = stats.status_counts.failed, "Queue drained");
            return Ok(stats);
        }
        if Instant::now() >= deadline {
            warn!(remaining, "Drain timeout reached, remaining events stay persisted");
            return Ok(stats);
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
