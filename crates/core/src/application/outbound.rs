// Out-of-band sends: system alerts and health reports bypass the buffer
use crate::domain::{AlertCooldown, QueueStats, SystemAlert};
use crate::port::{DeliveryError, EventCollector, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Send one payload, failing with `DeliveryError::Timeout` after `timeout`
pub async fn send_with_timeout(
    collector: &dyn EventCollector,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    match tokio::time::timeout(timeout, collector.send(payload)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Fire-and-forget reporter for alerts and health snapshots.
///
/// Sends are spawned and never retried, so a failing collector cannot make the
/// queue grow. Must be used from within a tokio runtime.
pub struct OutOfBandReporter {
    collector: Arc<dyn EventCollector>,
    time_provider: Arc<dyn TimeProvider>,
    cooldown: AlertCooldown,
    timeout: Duration,
}

impl OutOfBandReporter {
    pub fn new(
        collector: Arc<dyn EventCollector>,
        time_provider: Arc<dyn TimeProvider>,
        alert_cooldown_ms: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            collector,
            time_provider,
            cooldown: AlertCooldown::new(alert_cooldown_ms),
            timeout,
        }
    }

    /// Send an alert unless one of the same kind was sent within the cooldown.
    /// Returns true if the alert was sent.
    pub fn send_alert(&mut self, alert: SystemAlert) -> bool {
        let now = self.time_provider.now_millis();
        if !self.cooldown.try_acquire(alert.kind, now) {
            debug!(alert_type = alert.kind.as_str(), "Alert suppressed by cooldown");
            return false;
        }

        info!(alert_type = alert.kind.as_str(), "Sending system alert");
        self.spawn_send(alert.to_payload(self.time_provider.now_iso()));
        true
    }

    pub fn send_health(&self, stats: &QueueStats) {
        info!(
            queue_size = stats.queue_size,
            capacity_percent = stats.capacity_percent,
            in_flight = stats.in_flight,
            oldest_item_age_ms = stats.oldest_item_age_ms,
            failed = stats.status_counts.failed,
            "Queue health report"
        );
        self.spawn_send(stats.to_report(self.time_provider.now_iso()));
    }

    fn spawn_send(&self, payload: serde_json::Value) {
        let collector = Arc::clone(&self.collector);
        let timeout = self.timeout;
        tokio::spawn(async move {
            if let Err(e) = send_with_timeout(collector.as_ref(), &payload, timeout).await {
                warn!(
                    payload_type = payload.get("type").and_then(|t| t.as_str()).unwrap_or("unknown"),
                    error = %e,
                    "Out-of-band report not delivered"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, StatusCounts};
    use crate::port::event_collector::mocks::{MockBehavior, MockCollector};
    use crate::port::time_provider::mocks::MockTimeProvider;

    #[tokio::test(start_paused = true)]
    async fn test_send_with_timeout_hung_collector() {
        let collector = MockCollector::new(MockBehavior::Hang);
        let result =
            send_with_timeout(&collector, &serde_json::json!({}), Duration::from_millis(500)).await;
        assert_eq!(result, Err(DeliveryError::Timeout(500)));
    }

    #[tokio::test]
    async fn test_alert_cooldown_suppresses_repeat() {
        let collector = Arc::new(MockCollector::new_success());
        let clock = Arc::new(MockTimeProvider::new(0));
        let mut reporter = OutOfBandReporter::new(
            collector.clone(),
            clock.clone(),
            60_000,
            Duration::from_secs(1),
        );

        let alert = SystemAlert::new(AlertKind::QueuePruned, serde_json::json!({"removed": 1}));
        assert!(reporter.send_alert(alert.clone()));
        clock.advance(30_000);
        assert!(!reporter.send_alert(alert.clone()));
        clock.advance(30_000);
        assert!(reporter.send_alert(alert));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(collector.sent_of_type("system_alert").len(), 2);
    }

    #[tokio::test]
    async fn test_health_report_sent() {
        let collector = Arc::new(MockCollector::new_success());
        let reporter = OutOfBandReporter::new(
            collector.clone(),
            Arc::new(MockTimeProvider::new(0)),
            60_000,
            Duration::from_secs(1),
        );

        reporter.send_health(&QueueStats {
            queue_size: 1,
            max_queue_size: 10,
            capacity_percent: 10.0,
            in_flight: 0,
            oldest_item_age_ms: 0,
            status_counts: StatusCounts::default(),
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(collector.sent_of_type("queue_health").len(), 1);
    }
}
