// Event Tracker - public handle of the durable priority event queue

mod shutdown;
mod worker;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::engine::QueueEngine;
use crate::application::identity::AnonymousIdentity;
use crate::application::persistence::BufferPersistence;
use crate::domain::{ClassificationTable, EventData, PruneReport, QueueConfig, QueueStats};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{EventCollector, IdProvider, KeyValueStore, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use worker::{TrackerWorker, WorkerDeps};

/// Requests from the handle to the worker
pub(crate) enum Command {
    Track {
        event_type: String,
        data: EventData,
        timestamp: String,
        enqueued_at: i64,
    },
    Stats(oneshot::Sender<QueueStats>),
    PruneNow(oneshot::Sender<Option<PruneReport>>),
    PurgeFailed(oneshot::Sender<usize>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Handle to a durable priority event queue.
///
/// `track_event` is synchronous and never fails: the event is handed to a
/// background worker that buffers, persists and delivers it. The worker is
/// started lazily on first use (or explicitly with [`EventTracker::start`]) and
/// must run inside a tokio runtime.
pub struct EventTracker {
    commands: mpsc::UnboundedSender<Command>,
    pending_worker: Mutex<Option<TrackerWorker>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: ShutdownSender,
    stopped: AtomicBool,
    runtime_missing_logged: AtomicBool,
    time_provider: Arc<dyn TimeProvider>,
}

impl EventTracker {
    /// Create a new tracker with all dependencies injected
    ///
    /// # Errors
    /// - AppError::Domain if `config` fails validation
    pub fn new(
        config: QueueConfig,
        classifier: ClassificationTable,
        store: Arc<dyn KeyValueStore>,
        collector: Arc<dyn EventCollector>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = shutdown_channel();

        let worker = TrackerWorker::new(WorkerDeps {
            engine: QueueEngine::new(config, classifier),
            commands: commands_rx,
            shutdown: shutdown_rx,
            collector,
            persistence: BufferPersistence::new(Arc::clone(&store)),
            identity: AnonymousIdentity::new(store, Arc::clone(&id_provider)),
            id_provider,
            time_provider: Arc::clone(&time_provider),
        });

        Ok(Self {
            commands: commands_tx,
            pending_worker: Mutex::new(Some(worker)),
            worker_handle: Mutex::new(None),
            shutdown: shutdown_tx,
            stopped: AtomicBool::new(false),
            runtime_missing_logged: AtomicBool::new(false),
            time_provider,
        })
    }

    /// Create a tracker with the default classification table, UUIDs and system time
    pub fn with_defaults(
        config: QueueConfig,
        store: Arc<dyn KeyValueStore>,
        collector: Arc<dyn EventCollector>,
    ) -> Result<Self> {
        Self::new(
            config,
            ClassificationTable::default(),
            store,
            collector,
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        )
    }

    /// Start the background worker. Idempotent; returns true only for the call
    /// that actually started it.
    pub fn start(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                if !self.runtime_missing_logged.swap(true, Ordering::SeqCst) {
                    warn!("No tokio runtime available, event queue not started yet");
                }
                return false;
            }
        };

        let Some(worker) = lock(&self.pending_worker).take() else {
            return false;
        };
        let handle = runtime.spawn(worker.run());
        *lock(&self.worker_handle) = Some(handle);
        true
    }

    /// Buffer an event for delivery. Always returns true.
    ///
    /// The timestamp is taken now; buffering, persistence and delivery happen on
    /// the worker. Events whose type name is empty or only whitespace are dropped.
    pub fn track_event(&self, event_type: &str, data: EventData) -> bool {
        self.start();

        if event_type.trim().is_empty() {
            warn!("Ignoring event with empty type name");
            return true;
        }

        let enqueued_at = self.time_provider.now_millis();
        let command = Command::Track {
            event_type: event_type.to_string(),
            data,
            timestamp: self.time_provider.now_iso(),
            enqueued_at,
        };
        if self.commands.send(command).is_err() {
            debug!(event_type = %event_type, "Event queue stopped, dropping event");
        }
        true
    }

    /// Current health snapshot
    pub async fn stats(&self) -> Result<QueueStats> {
        self.request(Command::Stats).await
    }

    /// Run a pruning pass now
    pub async fn prune_now(&self) -> Result<Option<PruneReport>> {
        self.request(Command::PruneNow).await
    }

    /// Remove every terminally failed item. Returns how many were removed.
    pub async fn purge_failed(&self) -> Result<usize> {
        self.request(Command::PurgeFailed).await
    }

    /// Persist the buffer immediately
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await?
    }

    /// Stop the worker: buffer already-sent events, persist, and wait for it to exit
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown.shutdown();

        // Never started: dropping the worker closes the command channel
        lock(&self.pending_worker).take();

        let handle = lock(&self.worker_handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Event queue worker did not exit cleanly");
            }
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        self.start();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| AppError::QueueStopped)?;
        rx.await.map_err(|_| AppError::QueueStopped)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
