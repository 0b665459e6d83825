use super::monitor::LoginMonitor;
use super::probe::StatusProbe;
use super::qr::QrLocator;
use super::{LoginMessage, LoginPhase};
use crate::command::CommandBuilder;
use crate::config::{LoginConfig, Markers};
use crate::error::{Error, Result};
use crate::process::ProcessRunner;
use crate::store::SettingsStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One interactive login attempt
///
/// Owns the login process (through its monitor task), the current phase and
/// the message queue. Dropping the machine cancels the attempt and kills the
/// process.
///
/// # Examples
///
/// ```no_run
/// use bvdl::login::{LoginMessage, LoginStateMachine};
/// use bvdl::process::CliProcessRunner;
/// use bvdl::store::SettingsStore;
/// use bvdl::config::LoginConfig;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SettingsStore::open("bvconfig.json").await?;
/// let mut login = LoginStateMachine::new(
///     Arc::new(CliProcessRunner::new()),
///     store,
///     LoginConfig::default(),
/// );
///
/// login.start().await?;
/// while let Some(message) = login.next_message().await {
///     match message {
///         LoginMessage::QrReady { image } => println!("scan {:?}", image),
///         LoginMessage::QrExpired => login.retry().await?,
///         other => println!("{:?}", other),
///     }
/// }
/// println!("logged in: {}", login.is_logged_in());
/// # Ok(())
/// # }
/// ```
pub struct LoginStateMachine {
    runner: Arc<dyn ProcessRunner>,
    store: SettingsStore,
    config: LoginConfig,
    markers: Markers,
    qr_home: Option<PathBuf>,
    phase: LoginPhase,
    messages: mpsc::UnboundedReceiver<LoginMessage>,
    guard: CancellationToken,
    session: Option<Session>,
}

struct Session {
    cancel: CancellationToken,
    qr: QrLocator,
}

impl LoginStateMachine {
    /// Create an idle machine
    pub fn new(runner: Arc<dyn ProcessRunner>, store: SettingsStore, config: LoginConfig) -> Self {
        let qr_home = config.qr_home_dir.clone().or_else(dirs::home_dir);
        Self {
            runner,
            store,
            config,
            markers: Markers::default(),
            qr_home,
            phase: LoginPhase::Idle,
            messages: closed_queue(),
            guard: CancellationToken::new(),
            session: None,
        }
    }

    /// Use non-default output markers
    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    /// Search `home` instead of the user's home directory for the QR image
    pub fn with_home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.qr_home = home;
        self
    }

    /// Current phase, as of the last drained message
    pub fn phase(&self) -> LoginPhase {
        self.phase
    }

    /// Whether the attempt reached `LoggedIn` or `Failed`
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether the attempt ended with a verified login
    pub fn is_logged_in(&self) -> bool {
        self.phase == LoginPhase::LoggedIn
    }

    /// Token that cancels this attempt (and any retry of it) when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.guard.clone()
    }

    /// Launch `<exe> login` and start monitoring it
    ///
    /// Allowed from `Idle` and `QrExpired`. When the process cannot be
    /// launched the phase becomes `Failed`, a `LoginFailed` message is
    /// queued and the launch error is returned.
    pub async fn start(&mut self) -> Result<()> {
        if !matches!(self.phase, LoginPhase::Idle | LoginPhase::QrExpired) {
            return Err(self.invalid("start"));
        }
        self.launch().await
    }

    /// Relaunch after the QR code expired
    pub async fn retry(&mut self) -> Result<()> {
        if self.phase != LoginPhase::QrExpired {
            return Err(self.invalid("retry"));
        }
        tracing::info!("retrying login with a new QR code");
        self.launch().await
    }

    /// Abandon the attempt
    ///
    /// Kills the login process and deletes QR images. Queued messages are
    /// discarded. No-op once the attempt is finished.
    pub fn cancel(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            session.qr.cleanup();
        }
        self.messages = closed_queue();
        self.phase = LoginPhase::Failed;
        tracing::info!("login cancelled by consumer");
    }

    /// Drain every queued message without waiting
    ///
    /// Each message is applied to the phase in order before being returned.
    pub fn poll(&mut self) -> Vec<LoginMessage> {
        let mut drained = Vec::new();
        while let Ok(message) = self.messages.try_recv() {
            self.apply(&message);
            drained.push(message);
        }
        drained
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the monitor has stopped and the queue is empty.
    pub async fn next_message(&mut self) -> Option<LoginMessage> {
        let message = self.messages.recv().await?;
        self.apply(&message);
        Some(message)
    }

    async fn launch(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.messages = rx;
        self.phase = LoginPhase::AwaitingQr;

        let settings = self.store.load_or_default().await;
        let executable = settings.executable_path.clone();

        let handle = if settings.has_executable() {
            self.runner.run(&CommandBuilder.login_command(&executable)).await
        } else {
            Err(Error::NotFound("downloader executable is not configured".to_string()))
        };

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start login");
                self.phase = LoginPhase::Failed;
                if tx
                    .send(LoginMessage::LoginFailed {
                        reason: e.to_string(),
                    })
                    .is_err()
                {
                    tracing::debug!("login message dropped, consumer gone");
                }
                return Err(e);
            }
        };

        tracing::info!(executable = %executable.display(), "login started");

        let cancel = self.guard.child_token();
        let qr = QrLocator::new(&executable, self.qr_home.as_deref(), &self.config.qr_file_name);
        let monitor = LoginMonitor {
            handle,
            messages: tx,
            cancel: cancel.clone(),
            markers: self.markers.clone(),
            qr: qr.clone(),
            probe: StatusProbe::new(
                Arc::clone(&self.runner),
                self.markers.clone(),
                self.config.verify_timeout,
            ),
            store: self.store.clone(),
            settle_delay: self.config.settle_delay,
            executable,
            probe_identifier: settings.cached_probe_identifier,
        };
        tokio::spawn(monitor.run());

        self.session = Some(Session { cancel, qr });
        Ok(())
    }

    fn apply(&mut self, message: &LoginMessage) {
        if self.phase.is_terminal() {
            return;
        }
        let next = message.target_phase();
        tracing::debug!(from = %self.phase, to = %next, "login phase change");
        self.phase = next;
        if next.is_terminal() {
            self.session = None;
        }
    }

    fn invalid(&self, operation: &str) -> Error {
        Error::InvalidState {
            operation: operation.to_string(),
            phase: self.phase.to_string(),
        }
    }
}

impl Drop for LoginStateMachine {
    fn drop(&mut self) {
        self.guard.cancel();
    }
}

impl std::fmt::Debug for LoginStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginStateMachine")
            .field("phase", &self.phase)
            .field("runner", &self.runner.name())
            .finish_non_exhaustive()
    }
}

fn closed_queue() -> mpsc::UnboundedReceiver<LoginMessage> {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}
