//! Waiting helpers for end-to-end tests

use bvdl::{BatchId, BatchRejection, Event, Events, RunSummary};
use std::time::Duration;

/// Result of waiting for a batch to end
#[derive(Debug)]
pub enum WaitResult {
    /// Batch ran to completion
    Finished(RunSummary),
    /// Batch was rejected before running
    Rejected(BatchRejection),
    /// Timeout waiting for the batch
    Timeout,
    /// Event queue closed unexpectedly
    ChannelClosed,
}

/// Wait for `batch` to finish or be rejected
///
/// Every event received on the way (including the final one) is pushed to
/// `seen`.
pub async fn wait_for_batch_end(
    events: &mut Events,
    batch: BatchId,
    timeout: Duration,
    seen: &mut Vec<Event>,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            let Some(event) = events.recv().await else {
                return WaitResult::ChannelClosed;
            };
            seen.push(event.clone());
            match event {
                Event::BatchFinished { batch: id, summary } if id == batch => {
                    return WaitResult::Finished(summary);
                }
                Event::BatchRejected { batch: id, reason } if id == batch => {
                    return WaitResult::Rejected(reason);
                }
                _ => continue,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Unwrap a [`WaitResult::Finished`], panicking with context otherwise
pub fn expect_finished(result: WaitResult) -> RunSummary {
    match result {
        WaitResult::Finished(summary) => summary,
        other => panic!("expected the batch to finish, got {:?}", other),
    }
}
