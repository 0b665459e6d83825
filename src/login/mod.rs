//! Interactive QR-code login of the external tool
//!
//! A [`LoginStateMachine`] owns one login attempt: it launches `<exe> login`,
//! a background monitor task watches the tool's output and reports progress
//! as [`LoginMessage`]s through a FIFO queue, and the consumer drains that
//! queue on its own schedule with [`LoginStateMachine::poll`] (or awaits
//! [`LoginStateMachine::next_message`]). Phase changes are applied when the
//! consumer drains a message, so [`LoginStateMachine::phase`] always matches
//! what the consumer has seen.
//!
//! ```text
//! Idle ──start──▶ AwaitingQr ──QrReady──▶ QrDisplayed ──QrExpired──▶ QrExpired
//!                     │                       │                         │
//!                     └──────Verifying────────┤◀────────retry───────────┘
//!                                             ▼
//!                                     VerifyingSuccess ──▶ LoggedIn | Failed
//! ```
//!
//! A successful login marker is never trusted on its own: the monitor runs a
//! separate [`StatusProbe`] before reporting success.

mod machine;
mod monitor;
mod probe;
mod qr;

#[cfg(test)]
mod tests;

pub use machine::LoginStateMachine;
pub use probe::{StatusProbe, classify_probe_output};
pub use qr::QrLocator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reason reported when the status probe does not confirm a login
pub const VERIFICATION_FAILED: &str = "verification failed";

/// Reason reported when the login process ends without a result
pub const PROCESS_EXITED: &str = "login process exited";

/// Reason reported when the session was cancelled from outside
pub const LOGIN_CANCELLED: &str = "login cancelled";

/// Phase of one login attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPhase {
    /// Not started
    Idle,
    /// Login process launched, waiting for the QR code
    AwaitingQr,
    /// QR code written and handed to the consumer
    QrDisplayed,
    /// QR code expired; [`retry`](LoginStateMachine::retry) is possible
    QrExpired,
    /// Tool reported success, independent verification running
    VerifyingSuccess,
    /// Verified login (terminal)
    LoggedIn,
    /// Attempt failed or was cancelled (terminal)
    Failed,
}

impl LoginPhase {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::Failed)
    }
}

impl fmt::Display for LoginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingQr => "awaiting QR code",
            Self::QrDisplayed => "showing QR code",
            Self::QrExpired => "QR code expired",
            Self::VerifyingSuccess => "verifying",
            Self::LoggedIn => "logged in",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress report from the login monitor to the consumer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoginMessage {
    /// A QR code is ready to be shown
    QrReady {
        /// First existing QR image, if any was found
        image: Option<PathBuf>,
    },
    /// The QR code expired and the process was stopped
    QrExpired,
    /// The tool reported success; verification is running
    Verifying,
    /// Login verified and persisted
    LoginSucceeded,
    /// The attempt failed
    LoginFailed {
        /// Human-readable reason
        reason: String,
    },
}

impl LoginMessage {
    /// Phase the attempt is in once this message has been seen
    pub fn target_phase(&self) -> LoginPhase {
        match self {
            Self::QrReady { .. } => LoginPhase::QrDisplayed,
            Self::QrExpired => LoginPhase::QrExpired,
            Self::Verifying => LoginPhase::VerifyingSuccess,
            Self::LoginSucceeded => LoginPhase::LoggedIn,
            Self::LoginFailed { .. } => LoginPhase::Failed,
        }
    }
}
