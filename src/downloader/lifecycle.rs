//! Shutdown coordination.

use super::{BvDownloader, lock};
use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How long shutdown waits for the running batch
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl BvDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new batches
    /// 2. Cancels the active login attempt (killing its process)
    /// 3. Closes the batch queue
    /// 4. Waits (up to 30 seconds) for the worker to finish the running
    ///    batch; downloads in flight are not interrupted
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        self.cancel_login();
        drop(lock(&self.queue_state.batch_tx).take());

        let worker = lock(&self.queue_state.worker).take();
        if let Some(worker) = worker {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, worker).await {
                Ok(Ok(())) => tracing::info!("batch worker finished"),
                Ok(Err(e)) => tracing::warn!(error = %e, "batch worker ended abnormally"),
                Err(_) => tracing::warn!(
                    "timeout waiting for the running batch, proceeding with shutdown"
                ),
            }
        }

        tracing::info!("shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.queue_state.accepting_new.load(Ordering::SeqCst)
    }
}
