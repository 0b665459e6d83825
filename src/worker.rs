//! Sequential batch processing

use crate::error::{Error, Result};
use crate::extract::IdentifierExtractor;
use crate::store::SettingsStore;
use crate::supervisor::DownloadSupervisor;
use crate::types::{BatchId, BatchRejection, DownloadOutcome, Event, FailureReason, RunSummary};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One submitted block of free-form text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Sequence number assigned at submission
    pub id: BatchId,
    /// Raw text to extract identifiers from
    pub text: String,
}

/// Admission control for new batches
///
/// Only one batch may be queued or running at a time, and a new one is
/// accepted only after a cooldown following the end of the previous one.
/// Advisory: it throttles submissions, nothing else depends on it.
#[derive(Debug)]
pub struct SubmissionGate {
    cooldown: Duration,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    busy: bool,
    open_at: Option<Instant>,
}

impl SubmissionGate {
    /// Gate with the given cooldown
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Claim the gate for a new batch
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while a batch is in progress, [`Error::CoolingDown`]
    /// right after one finished.
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.state();
        if state.busy {
            return Err(Error::Busy);
        }
        if state.open_at.is_some_and(|at| Instant::now() < at) {
            return Err(Error::CoolingDown);
        }
        state.busy = true;
        Ok(())
    }

    /// Mark the current batch as finished and start the cooldown
    pub fn release(&self) {
        let mut state = self.state();
        state.busy = false;
        state.open_at = Some(Instant::now() + self.cooldown);
    }

    /// Whether a batch is queued or running
    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Consumes batches one at a time and downloads their identifiers in order
///
/// Never runs two downloads at once. Every failure is turned into an
/// [`Event`]; nothing stops the loop except the batch queue closing.
pub struct TaskQueueWorker {
    batches: mpsc::UnboundedReceiver<Batch>,
    events: mpsc::UnboundedSender<Event>,
    supervisor: DownloadSupervisor,
    store: SettingsStore,
    gate: Arc<SubmissionGate>,
    summary: RunSummary,
}

impl TaskQueueWorker {
    /// Create a worker reading from `batches` and reporting to `events`
    pub fn new(
        batches: mpsc::UnboundedReceiver<Batch>,
        events: mpsc::UnboundedSender<Event>,
        supervisor: DownloadSupervisor,
        store: SettingsStore,
        gate: Arc<SubmissionGate>,
    ) -> Self {
        Self {
            batches,
            events,
            supervisor,
            store,
            gate,
            summary: RunSummary::new(),
        }
    }

    /// Spawn the worker loop
    ///
    /// The task ends once every sender of the batch queue is dropped and the
    /// queue is empty.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::info!("batch worker started");
        while let Some(batch) = self.batches.recv().await {
            self.process(batch).await;
            self.gate.release();
        }
        tracing::info!("batch worker stopped");
    }

    async fn process(&mut self, batch: Batch) {
        let settings = self.store.load_or_default().await;
        let extractor = IdentifierExtractor::new(&settings.identifier_prefix).unwrap_or_else(|e| {
            tracing::warn!(
                prefix = %settings.identifier_prefix,
                error = %e,
                "unusable identifier prefix, using the default"
            );
            IdentifierExtractor::default()
        });

        let identifiers = extractor.extract(&batch.text);
        if identifiers.is_empty() {
            tracing::warn!(batch = %batch.id, "no identifiers found");
            self.emit(Event::BatchRejected {
                batch: batch.id,
                reason: BatchRejection::NoIdentifiers,
            });
            return;
        }

        tracing::info!(batch = %batch.id, count = identifiers.len(), "batch started");
        self.summary = RunSummary::new();
        self.emit(Event::BatchStarted {
            batch: batch.id,
            identifiers: identifiers.clone(),
        });

        for identifier in identifiers {
            let settings = self.store.load_or_default().await;

            let outcome = if settings.login_blocks_download() {
                tracing::warn!(identifier = %identifier, "skipped: forced login without a session");
                DownloadOutcome::failed(identifier, Vec::new(), FailureReason::LoginRequired)
            } else {
                self.emit(Event::DownloadStarted {
                    batch: batch.id,
                    identifier: identifier.clone(),
                });
                self.supervisor.run_one(&identifier, &settings).await
            };

            if outcome.success
                && let Err(e) = self
                    .store
                    .set_cached_probe_identifier(outcome.identifier.as_str())
                    .await
            {
                tracing::warn!(error = %e, "failed to remember probe identifier");
            }

            self.summary.record(&outcome);
            self.emit(Event::DownloadFinished {
                batch: batch.id,
                outcome,
            });
        }

        let summary = self.summary.finish();
        tracing::info!(
            batch = %batch.id,
            succeeded = summary.success_count,
            failed = summary.failure_count(),
            "batch finished"
        );
        self.emit(Event::BatchFinished {
            batch: batch.id,
            summary,
        });
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("event dropped, no consumer");
        }
    }
}
