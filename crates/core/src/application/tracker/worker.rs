// Queue worker - single task owning the engine
//
// Commands from the handle, delivery completions, retry wake-ups and timer
// ticks all arrive here and are applied one at a time.

use super::shutdown::ShutdownToken;
use super::Command;
use crate::application::engine::{CompletionOutcome, Dispatch, QueueEngine};
use crate::application::identity::AnonymousIdentity;
use crate::application::outbound::{send_with_timeout, OutOfBandReporter};
use crate::application::persistence::BufferPersistence;
use crate::domain::{
    AlertKind, EventData, EventPayload, ItemId, PruneReport, QueueItem, SystemAlert,
};
use crate::error::Result;
use crate::port::{DeliveryError, EventCollector, IdProvider, TimeProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Messages posted back to the worker by tasks it spawned
#[derive(Debug)]
enum WorkerEvent {
    Delivered(ItemId),
    DeliveryFailed { item_id: ItemId, error: DeliveryError },
    RetryDue(ItemId),
}

pub(crate) struct TrackerWorker {
    engine: QueueEngine,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    shutdown: ShutdownToken,
    collector: Arc<dyn EventCollector>,
    persistence: BufferPersistence,
    identity: AnonymousIdentity,
    reporter: OutOfBandReporter,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    anonymous_id: String,
    last_persisted: Instant,
}

pub(crate) struct WorkerDeps {
    pub engine: QueueEngine,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub shutdown: ShutdownToken,
    pub collector: Arc<dyn EventCollector>,
    pub persistence: BufferPersistence,
    pub identity: AnonymousIdentity,
    pub id_provider: Arc<dyn IdProvider>,
    pub time_provider: Arc<dyn TimeProvider>,
}

impl TrackerWorker {
    pub(crate) fn new(deps: WorkerDeps) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let config = deps.engine.config();
        let reporter = OutOfBandReporter::new(
            Arc::clone(&deps.collector),
            Arc::clone(&deps.time_provider),
            config.alert_cooldown_ms,
            config.request_timeout(),
        );
        Self {
            engine: deps.engine,
            commands: deps.commands,
            events_tx,
            events_rx,
            shutdown: deps.shutdown,
            collector: deps.collector,
            persistence: deps.persistence,
            identity: deps.identity,
            reporter,
            id_provider: deps.id_provider,
            time_provider: deps.time_provider,
            anonymous_id: String::new(),
            last_persisted: Instant::now(),
        }
    }

    /// Run the worker loop until shutdown or until the handle is dropped
    pub(crate) async fn run(mut self) {
        self.restore().await;

        let config = self.engine.config().clone();
        let mut dispatch_tick = interval(config.processing_interval());
        dispatch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let health_period = config.health_report_interval();
        let mut health_tick = interval_at(Instant::now() + health_period, health_period);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            max_queue_size = config.max_queue_size,
            max_concurrent_requests = config.max_concurrent_requests,
            processing_interval_ms = config.processing_interval_ms,
            "Event queue worker started"
        );

        loop {
            if self.shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = self.shutdown.wait() => {
                    info!("Event queue worker shutting down");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("Tracker handle dropped, stopping worker");
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = dispatch_tick.tick() => self.on_tick().await,
                _ = health_tick.tick() => self.report_health(),
            }
        }

        // Commands sent before the stop signal still get buffered and persisted
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command).await;
        }
        let _ = self.persist().await;
        info!(
            remaining = self.engine.buffer().len(),
            "Event queue worker stopped"
        );
    }

    async fn restore(&mut self) {
        match self.persistence.load().await {
            Ok(items) => self.engine.restore(items),
            Err(e) => warn!(error = %e, "Failed to load persisted buffer, starting empty"),
        }

        self.anonymous_id = match self.identity.get_or_create().await {
            Ok(id) => id,
            Err(e) => {
                let id = format!("anon_{}", self.id_provider.generate_id());
                warn!(error = %e, anonymous_id = %id, "Anonymous id not persisted, using ephemeral id");
                id
            }
        };
        self.last_persisted = Instant::now();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Track {
                event_type,
                data,
                timestamp,
                enqueued_at,
            } => self.track(event_type, data, timestamp, enqueued_at).await,
            Command::Stats(reply) => {
                let _ = reply.send(self.engine.stats(self.time_provider.now_millis()));
            }
            Command::PruneNow(reply) => {
                let report = self.engine.prune();
                if let Some(report) = &report {
                    self.alert_pruned(report);
                }
                let _ = reply.send(report);
            }
            Command::PurgeFailed(reply) => {
                let removed = self.engine.purge_failed();
                info!(removed, "Purged failed items");
                let _ = reply.send(removed);
            }
            Command::Flush(reply) => {
                let _ = reply.send(self.persist().await);
            }
        }
    }

    async fn track(
        &mut self,
        event_type: String,
        data: EventData,
        timestamp: String,
        enqueued_at: i64,
    ) {
        let payload = EventPayload::new(&event_type, timestamp, &self.anonymous_id, data);
        let item_id = self.id_provider.generate_id();
        let outcome = self
            .engine
            .enqueue(item_id.clone(), &event_type, payload, enqueued_at);

        if let Some(report) = &outcome.pruned {
            self.alert_pruned(report);
        }
        if let Some(evicted) = &outcome.evicted {
            self.alert_overflow(evicted);
        }

        debug!(
            item_id = %item_id,
            event_type = %event_type,
            queue_size = self.engine.buffer().len(),
            "Event buffered"
        );

        if outcome.persist_due {
            let _ = self.persist().await;
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Delivered(item_id) => {
                self.engine.on_delivered(&item_id);
            }
            WorkerEvent::DeliveryFailed { item_id, error } => {
                debug!(item_id = %item_id, error = %error, "Delivery attempt failed");
                let now = self.time_provider.now_millis();
                match self.engine.on_delivery_failed(&item_id, now) {
                    CompletionOutcome::Retry { delay_ms } => self.schedule_retry(item_id, delay_ms),
                    CompletionOutcome::Failed => {
                        warn!(item_id = %item_id, error = %error, "Event delivery failed permanently");
                    }
                    CompletionOutcome::Delivered | CompletionOutcome::Untracked => {}
                }
            }
            WorkerEvent::RetryDue(item_id) => {
                if self.engine.on_retry_due(&item_id) {
                    debug!(item_id = %item_id, "Item ready for retry");
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        for dispatch in self.engine.drain_dispatchable() {
            self.spawn_delivery(dispatch);
        }

        if self.last_persisted.elapsed() >= self.engine.config().persistence_interval() {
            let _ = self.persist().await;
        }
    }

    fn spawn_delivery(&self, dispatch: Dispatch) {
        let collector = Arc::clone(&self.collector);
        let events = self.events_tx.clone();
        let timeout = self.engine.config().request_timeout();

        tokio::spawn(async move {
            let Dispatch { item_id, payload } = dispatch;
            let event = match send_with_timeout(collector.as_ref(), &payload, timeout).await {
                Ok(()) => WorkerEvent::Delivered(item_id),
                Err(error) => WorkerEvent::DeliveryFailed { item_id, error },
            };
            let _ = events.send(event);
        });
    }

    fn schedule_retry(&self, item_id: ItemId, delay_ms: u64) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = events.send(WorkerEvent::RetryDue(item_id));
        });
    }

    fn report_health(&self) {
        let stats = self.engine.stats(self.time_provider.now_millis());
        if stats.is_active() {
            self.reporter.send_health(&stats);
        }
    }

    fn alert_pruned(&mut self, report: &PruneReport) {
        let alert = SystemAlert::new(
            AlertKind::QueuePruned,
            json!({
                "size_before": report.size_before,
                "size_after": report.size_after,
                "removed_low": report.removed_low,
                "removed_medium": report.removed_medium,
                "max_queue_size": self.engine.buffer().capacity(),
            }),
        );
        self.reporter.send_alert(alert);
    }

    fn alert_overflow(&mut self, evicted: &QueueItem) {
        warn!(
            item_id = %evicted.id,
            event_type = %evicted.event_type,
            "Queue full, evicted oldest item"
        );
        let alert = SystemAlert::new(
            AlertKind::QueueOverflow,
            json!({
                "evicted_item_id": evicted.id,
                "evicted_event_type": evicted.event_type,
                "max_queue_size": self.engine.buffer().capacity(),
            }),
        );
        self.reporter.send_alert(alert);
    }

    async fn persist(&mut self) -> Result<()> {
        let result = self
            .persistence
            .save(self.engine.buffer().items(), self.engine.in_flight())
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to persist buffer");
        }
        self.last_persisted = Instant::now();
        self.engine.mark_persisted();
        result
    }
}
