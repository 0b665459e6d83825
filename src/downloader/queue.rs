//! Batch submission.

use super::{BvDownloader, lock};
use crate::error::{Error, Result};
use crate::types::{BatchId, BatchRejection, Event};
use crate::worker::Batch;
use std::sync::atomic::Ordering;

impl BvDownloader {
    /// Queue a block of free-form text for download
    ///
    /// Identifiers are extracted by the worker when the batch runs. Blank
    /// text, or forced login without a session, is rejected immediately with
    /// an [`Event::BatchRejected`]; the rejection still counts as a finished
    /// batch and starts the cooldown.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - [`Error::Busy`] while another batch is queued or running
    /// - [`Error::CoolingDown`] shortly after the previous batch ended
    pub async fn submit(&self, text: &str) -> Result<BatchId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.queue_state.gate.try_acquire()?;

        let batch = BatchId(self.queue_state.next_batch.fetch_add(1, Ordering::SeqCst) + 1);

        if text.trim().is_empty() {
            self.reject(batch, BatchRejection::EmptyInput);
            return Ok(batch);
        }

        let settings = self.store.load_or_default().await;
        if settings.login_blocks_download() {
            self.reject(batch, BatchRejection::LoginRequired);
            return Ok(batch);
        }

        let sender = lock(&self.queue_state.batch_tx).clone();
        let sent = sender.is_some_and(|tx| {
            tx.send(Batch {
                id: batch,
                text: text.to_string(),
            })
            .is_ok()
        });
        if !sent {
            self.queue_state.gate.release();
            return Err(Error::ShuttingDown);
        }

        tracing::info!(batch = %batch, "batch queued");
        Ok(batch)
    }

    /// Whether a batch is queued or running
    pub fn is_busy(&self) -> bool {
        self.queue_state.gate.is_busy()
    }

    fn reject(&self, batch: BatchId, reason: BatchRejection) {
        tracing::warn!(batch = %batch, reason = %reason, "batch rejected");
        self.emit(Event::BatchRejected { batch, reason });
        self.queue_state.gate.release();
    }
}
