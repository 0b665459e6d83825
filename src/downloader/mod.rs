//! Downloader facade split into focused submodules.
//!
//! The `BvDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Batch submission and admission control
//! - [`login`] - Interactive login, status probing and executable discovery
//! - [`lifecycle`] - Shutdown coordination

mod lifecycle;
mod login;
mod queue;


use crate::config::{Config, Settings};
use crate::error::Result;
use crate::process::{CliProcessRunner, ProcessRunner};
use crate::store::SettingsStore;
use crate::supervisor::DownloadSupervisor;
use crate::types::Event;
use crate::worker::{Batch, SubmissionGate, TaskQueueWorker};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Batch queue and worker state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Sender side of the batch queue (taken on shutdown to stop the worker)
    pub(crate) batch_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Batch>>>>,
    /// Busy flag and cooldown shared with the worker
    pub(crate) gate: Arc<SubmissionGate>,
    /// Last assigned batch number
    pub(crate) next_batch: Arc<AtomicU64>,
    /// Whether new batches are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Worker task, awaited on shutdown
    pub(crate) worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Main entry point (cloneable - all fields are Arc-wrapped)
///
/// Wires the settings store, the process runner, the batch worker and the
/// login slot together. Events for the front-end arrive on the [`Events`]
/// queue returned by [`BvDownloader::new`].
///
/// # Examples
///
/// ```no_run
/// use bvdl::{BvDownloader, Config, Event};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (downloader, mut events) = BvDownloader::new(Config::default()).await?;
/// downloader.ensure_executable().await?;
///
/// downloader.submit("BV1xx411c7mD BV1GJ411x7h7").await?;
/// while let Some(event) = events.recv().await {
///     if let Event::BatchFinished { summary, .. } = event {
///         println!("{}", summary);
///         break;
///     }
/// }
///
/// downloader.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BvDownloader {
    /// Static configuration
    pub(crate) config: Arc<Config>,
    /// Persisted settings document
    pub(crate) store: SettingsStore,
    /// Launches the external tool
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Event queue sender (single consumer)
    pub(crate) event_tx: mpsc::UnboundedSender<Event>,
    /// Batch queue and worker
    pub(crate) queue_state: QueueState,
    /// Cancellation token of the active login attempt, if any
    pub(crate) login_slot: Arc<Mutex<Option<CancellationToken>>>,
}

/// Receiving end of the event queue
///
/// Drain it from the front-end's own scheduling context, either without
/// waiting ([`drain`](Self::drain)) or asynchronously ([`recv`](Self::recv)).
#[derive(Debug)]
pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    /// Every queued event, oldest first, without waiting
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Next event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl BvDownloader {
    /// Create a downloader driving the real external tool
    ///
    /// Opens (or creates) the settings document and starts the batch worker.
    pub async fn new(config: Config) -> Result<(Self, Events)> {
        Self::with_runner(config, Arc::new(CliProcessRunner::new())).await
    }

    /// Create a downloader launching processes through `runner`
    pub async fn with_runner(
        config: Config,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<(Self, Events)> {
        let store = SettingsStore::open(&config.settings_path).await?;
        tracing::info!(
            settings = %store.path().display(),
            runner = runner.name(),
            "initializing downloader"
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(SubmissionGate::new(config.queue.cooldown));

        let supervisor = DownloadSupervisor::new(Arc::clone(&runner), config.markers.clone());
        let worker = TaskQueueWorker::new(
            batch_rx,
            event_tx.clone(),
            supervisor,
            store.clone(),
            Arc::clone(&gate),
        )
        .start();

        let downloader = Self {
            config: Arc::new(config),
            store,
            runner,
            event_tx,
            queue_state: QueueState {
                batch_tx: Arc::new(Mutex::new(Some(batch_tx))),
                gate,
                next_batch: Arc::new(AtomicU64::new(0)),
                accepting_new: Arc::new(AtomicBool::new(true)),
                worker: Arc::new(Mutex::new(Some(worker))),
            },
            login_slot: Arc::new(Mutex::new(None)),
        };

        Ok((downloader, Events { rx: event_rx }))
    }

    /// Static configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persisted settings document
    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Fresh snapshot of the settings document
    pub async fn settings(&self) -> Result<Settings> {
        self.store.load().await
    }

    pub(crate) fn emit(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("event dropped, no consumer");
        }
    }
}

// Poisoning is ignored: every guarded value stays valid between statements.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl std::fmt::Debug for BvDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BvDownloader")
            .field("settings", &self.store.path())
            .field("runner", &self.runner.name())
            .finish_non_exhaustive()
    }
}
