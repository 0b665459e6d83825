//! Independent check of the tool's login state

use crate::command::CommandBuilder;
use crate::config::Markers;
use crate::error::Error;
use crate::process::ProcessRunner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

/// Runs `<exe> -info <probe>` and reads the login state from its output
///
/// The whole probe (launch and output) runs under one hard deadline. On
/// timeout the process is killed. Any error, timeout or unrecognised output
/// counts as "not logged in".
#[derive(Clone)]
pub struct StatusProbe {
    runner: Arc<dyn ProcessRunner>,
    markers: Markers,
    timeout: Duration,
}

impl StatusProbe {
    /// Create a probe with the given deadline
    pub fn new(runner: Arc<dyn ProcessRunner>, markers: Markers, timeout: Duration) -> Self {
        Self {
            runner,
            markers,
            timeout,
        }
    }

    /// Whether the tool at `executable` has a usable session
    pub async fn verify(&self, executable: &Path, probe: &str) -> bool {
        if executable.as_os_str().is_empty() {
            tracing::warn!("login status probe skipped: no executable configured");
            return false;
        }

        let command = CommandBuilder.status_probe_command(executable, probe);
        let deadline = Instant::now() + self.timeout;

        let mut handle = match timeout_at(deadline, self.runner.run(&command)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "login status probe could not start");
                return false;
            }
            Err(_) => {
                self.log_timeout();
                return false;
            }
        };

        let mut output = Vec::new();
        let read = timeout_at(deadline, async {
            while let Some(line) = handle.next_line().await {
                tracing::debug!(probe, "{}", line);
                output.push(line);
            }
        })
        .await;

        if read.is_err() {
            self.log_timeout();
            handle.terminate().await;
            return false;
        }

        let logged_in = classify_probe_output(&self.markers, &output);
        tracing::info!(probe, logged_in, "login status probe finished");
        logged_in
    }

    fn log_timeout(&self) {
        let err = Error::Timeout {
            operation: "login status probe".to_string(),
            timeout: self.timeout,
        };
        tracing::warn!(error = %err, "treating login state as logged out");
    }
}

impl std::fmt::Debug for StatusProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusProbe")
            .field("runner", &self.runner.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Decide the login state from probe output
///
/// "Not logged in" markers win over "session loaded" markers; output with
/// neither is treated as logged out.
pub fn classify_probe_output(markers: &Markers, output: &[String]) -> bool {
    let any = |wanted: &[String]| {
        output
            .iter()
            .any(|line| wanted.iter().any(|m| Markers::line_has(line, m)))
    };

    if any(&markers.not_logged_in) {
        return false;
    }
    any(&markers.session_loaded)
}
