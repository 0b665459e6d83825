//! Login attempts, status probing and executable discovery.

use super::{BvDownloader, lock};
use crate::error::{Error, Result};
use crate::login::{LoginStateMachine, StatusProbe};
use crate::tools;
use crate::types::Event;
use std::path::PathBuf;
use std::sync::Arc;

impl BvDownloader {
    /// Start a new interactive login attempt
    ///
    /// Any previous attempt is cancelled first, so at most one login process
    /// runs at a time. The returned machine belongs to the caller, who drains
    /// its messages.
    ///
    /// # Errors
    ///
    /// Returns the launch error when the login process cannot be started.
    pub async fn begin_login(&self) -> Result<LoginStateMachine> {
        if let Some(previous) = lock(&self.login_slot).take() {
            tracing::info!("superseding previous login attempt");
            previous.cancel();
        }

        let mut machine = LoginStateMachine::new(
            Arc::clone(&self.runner),
            self.store.clone(),
            self.config.login.clone(),
        )
        .with_markers(self.config.markers.clone());

        machine.start().await?;

        // a concurrent call may have stored its own attempt while this one started
        if let Some(other) = lock(&self.login_slot).replace(machine.cancellation_token()) {
            tracing::info!("superseding concurrent login attempt");
            other.cancel();
        }
        Ok(machine)
    }

    /// Cancel the active login attempt, if any
    pub fn cancel_login(&self) {
        if let Some(token) = lock(&self.login_slot).take() {
            token.cancel();
        }
    }

    /// Probe the tool's login state and persist it
    ///
    /// Emits [`Event::LoginStatusChanged`] with the result.
    pub async fn refresh_login_status(&self) -> Result<bool> {
        let settings = self.store.load().await?;
        let probe = StatusProbe::new(
            Arc::clone(&self.runner),
            self.config.markers.clone(),
            self.config.login.verify_timeout,
        );

        let logged_in = probe
            .verify(&settings.executable_path, &settings.cached_probe_identifier)
            .await;

        self.store.set_logged_in(logged_in).await?;
        tracing::info!(logged_in, "login status refreshed");
        self.emit(Event::LoginStatusChanged { logged_in });
        Ok(logged_in)
    }

    /// Locate the downloader executable and remember it
    ///
    /// Keeps the configured path when it exists, otherwise searches the
    /// settings directory, the application directory and `PATH` and
    /// persists whatever it finds.
    pub async fn ensure_executable(&self) -> Result<PathBuf> {
        let settings = self.store.load().await?;
        let config_dir = self.store.path().parent();

        let found = tools::discover_executable(&settings.executable_path, config_dir)
            .ok_or_else(|| Error::NotFound(format!("{} executable", tools::TOOL_NAME)))?;

        if found != settings.executable_path {
            tracing::info!(path = %found.display(), "using discovered downloader executable");
            self.store.set_executable_path(found.clone()).await?;
        }
        Ok(found)
    }
}
