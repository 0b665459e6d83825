//! Running a single download to completion

use crate::command::CommandBuilder;
use crate::config::{Markers, Settings};
use crate::process::ProcessRunner;
use crate::types::{DownloadOutcome, FailureReason, Identifier};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Runs the external tool for one identifier and classifies the result
///
/// Success is decided by *completion marker seen OR exit code 0*; either one
/// is enough. Only failed runs are classified.
#[derive(Clone)]
pub struct DownloadSupervisor {
    runner: Arc<dyn ProcessRunner>,
    builder: CommandBuilder,
    markers: Markers,
}

impl DownloadSupervisor {
    /// Create a supervisor launching through `runner`
    pub fn new(runner: Arc<dyn ProcessRunner>, markers: Markers) -> Self {
        Self {
            runner,
            builder: CommandBuilder,
            markers,
        }
    }

    /// Download one identifier and wait for the outcome
    ///
    /// Never fails: a launch error becomes a failed outcome with
    /// [`FailureReason::Launch`] and no output.
    pub async fn run_one(&self, identifier: &Identifier, settings: &Settings) -> DownloadOutcome {
        let command = self.builder.build(identifier, settings);
        tracing::info!(identifier = %identifier, command = %command, "starting download");

        let mut handle = match self.runner.run(&command).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "failed to launch downloader");
                return DownloadOutcome::failed(
                    identifier.clone(),
                    Vec::new(),
                    FailureReason::Launch(e.to_string()),
                );
            }
        };

        let mut output = Vec::new();
        let mut completed = false;
        while let Some(line) = handle.next_line().await {
            tracing::debug!(identifier = %identifier, "{}", line);
            if self.markers.is_task_complete(&line) {
                completed = true;
            }
            output.push(line);
        }

        let exit_code = handle.exit_code().await;

        if completed || exit_code == Some(0) {
            tracing::info!(identifier = %identifier, ?exit_code, "download finished");
            return DownloadOutcome::succeeded(identifier.clone(), output);
        }

        let reason = classify_failure(&self.markers, &output);
        if reason.is_classified() {
            tracing::warn!(
                identifier = %identifier,
                ?exit_code,
                reason = %reason,
                "download failed"
            );
        } else {
            tracing::warn!(
                identifier = %identifier,
                ?exit_code,
                last_line = output.last().map(String::as_str).unwrap_or_default(),
                "download failed for an unrecognised reason"
            );
        }
        DownloadOutcome::failed(identifier.clone(), output, reason)
    }

    /// Download one identifier and hand the outcome to `on_complete`
    ///
    /// The callback runs exactly once, on the calling task.
    pub async fn run_one_with<F, T>(
        &self,
        identifier: &Identifier,
        settings: &Settings,
        on_complete: F,
    ) -> T
    where
        F: FnOnce(DownloadOutcome) -> T,
    {
        on_complete(self.run_one(identifier, settings).await)
    }

    /// Download one identifier on a background task
    ///
    /// The outcome is delivered once through the returned receiver.
    pub fn spawn_one(
        &self,
        identifier: Identifier,
        settings: Settings,
    ) -> oneshot::Receiver<DownloadOutcome> {
        let (tx, rx) = oneshot::channel();
        let supervisor = self.clone();
        tokio::spawn(async move {
            let outcome = supervisor.run_one(&identifier, &settings).await;
            if tx.send(outcome).is_err() {
                tracing::debug!(identifier = %identifier, "download outcome dropped, receiver gone");
            }
        });
        rx
    }
}

impl std::fmt::Debug for DownloadSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSupervisor")
            .field("runner", &self.runner.name())
            .finish_non_exhaustive()
    }
}

/// Map the output of a failed run to a reason
///
/// The length error is checked before "not found"; anything unrecognised is
/// [`FailureReason::Other`].
pub fn classify_failure(markers: &Markers, output: &[String]) -> FailureReason {
    let has = |marker: &str| output.iter().any(|line| Markers::line_has(line, marker));

    if has(&markers.identifier_length_error) {
        FailureReason::IdentifierLength
    } else if has(&markers.content_not_found) {
        FailureReason::ContentNotFound
    } else {
        FailureReason::Other
    }
}
