//! Background task watching the login process

use super::probe::StatusProbe;
use super::qr::QrLocator;
use super::{LOGIN_CANCELLED, LoginMessage, PROCESS_EXITED, VERIFICATION_FAILED};
use crate::config::Markers;
use crate::process::ProcessHandle;
use crate::store::SettingsStore;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything the monitor task owns for one login process
pub(super) struct LoginMonitor {
    pub handle: Box<dyn ProcessHandle>,
    pub messages: mpsc::UnboundedSender<LoginMessage>,
    pub cancel: CancellationToken,
    pub markers: Markers,
    pub qr: QrLocator,
    pub probe: StatusProbe,
    pub store: SettingsStore,
    pub settle_delay: Duration,
    pub executable: PathBuf,
    pub probe_identifier: String,
}

enum Step {
    Continue,
    Done,
}

impl LoginMonitor {
    pub async fn run(mut self) {
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.abort().await;
                    return;
                }
                line = self.handle.next_line() => line,
            };

            let Some(line) = line else {
                tracing::info!("login process ended without a result");
                self.qr.cleanup();
                self.send(LoginMessage::LoginFailed {
                    reason: PROCESS_EXITED.to_string(),
                });
                return;
            };

            if !self.markers.is_qr_art(&line) {
                tracing::debug!(target: "bvdl::login", "{}", line);
            }

            if let Step::Done = self.on_line(&line).await {
                return;
            }
        }
    }

    async fn on_line(&mut self, line: &str) -> Step {
        if Markers::line_has(line, &self.markers.qr_generated) {
            if !self.settle().await {
                return Step::Done;
            }
            let image = self.qr.find();
            match &image {
                Some(path) => tracing::info!(path = %path.display(), "QR code ready"),
                None => tracing::warn!(candidates = ?self.qr.candidates(), "QR code image not found"),
            }
            self.send(LoginMessage::QrReady { image });
            Step::Continue
        } else if Markers::line_has(line, &self.markers.qr_expired) {
            tracing::info!("QR code expired");
            self.handle.terminate().await;
            self.qr.cleanup();
            self.send(LoginMessage::QrExpired);
            Step::Done
        } else if Markers::line_has(line, &self.markers.login_succeeded) {
            self.verify_login().await;
            Step::Done
        } else {
            Step::Continue
        }
    }

    async fn verify_login(&mut self) {
        tracing::info!("tool reports login success, verifying");
        self.send(LoginMessage::Verifying);

        if !self.settle().await {
            return;
        }

        let verified = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.abort().await;
                return;
            }
            verified = self.probe.verify(&self.executable, &self.probe_identifier) => verified,
        };

        self.qr.cleanup();
        self.handle.terminate().await;

        if let Err(e) = self.store.set_logged_in(verified).await {
            tracing::warn!(error = %e, "failed to persist login state");
        }

        if verified {
            tracing::info!("login verified");
            self.send(LoginMessage::LoginSucceeded);
        } else {
            tracing::warn!("login could not be verified");
            self.send(LoginMessage::LoginFailed {
                reason: VERIFICATION_FAILED.to_string(),
            });
        }
    }

    // Returns false when the session was cancelled during the delay.
    async fn settle(&mut self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.abort().await;
                false
            }
            _ = tokio::time::sleep(self.settle_delay) => true,
        }
    }

    async fn abort(&mut self) {
        tracing::info!("login session cancelled");
        self.handle.terminate().await;
        self.qr.cleanup();
        // only reaches a consumer if the session was cancelled from outside
        self.send(LoginMessage::LoginFailed {
            reason: LOGIN_CANCELLED.to_string(),
        });
    }

    fn send(&self, message: LoginMessage) {
        if self.messages.send(message).is_err() {
            tracing::debug!("login message dropped, consumer gone");
        }
    }
}
