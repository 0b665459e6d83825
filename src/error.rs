//! Error types for bvdl
//!
//! Operational errors (launching the external tool, settings I/O, invalid
//! state transitions) live in [`Error`]. Per-download failure categories are
//! not errors: they are reported as [`FailureReason`](crate::types::FailureReason)
//! inside a [`DownloadOutcome`](crate::types::DownloadOutcome) so that no single
//! item can terminate the worker loop.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for bvdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bvdl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The settings key that caused the error (e.g., "executable_path")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identifier prefix produced an invalid pattern
    #[error("invalid identifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The external tool could not be found or spawned
    #[error("failed to launch {}: {reason}", program.display())]
    Launch {
        /// Program that was being launched
        program: PathBuf,
        /// OS-level reason the spawn failed
        reason: String,
    },

    /// An external invocation exceeded its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being waited on (e.g., "login status probe")
        operation: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// Operation not permitted in the current login phase
    #[error("cannot {operation} while login is {phase}")]
    InvalidState {
        /// The operation that was attempted (e.g., "retry")
        operation: String,
        /// The phase that prevents it
        phase: String,
    },

    /// A batch was submitted before the cooldown elapsed
    #[error("submission rejected: cooling down after the previous batch")]
    CoolingDown,

    /// A batch was submitted while another one is still running
    #[error("submission rejected: a batch is already in progress")]
    Busy,

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// Something expected on disk was not there (executable, QR image, ...)
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Machine-readable error code, stable across releases
    ///
    /// Front-ends can switch on this instead of parsing `Display` output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::Launch { .. } => "launch_error",
            Error::Timeout { .. } => "timeout",
            Error::InvalidState { .. } => "invalid_state",
            Error::CoolingDown => "cooling_down",
            Error::Busy => "busy",
            Error::ShuttingDown => "shutting_down",
            Error::NotFound(_) => "not_found",
        }
    }

    /// Whether retrying the same call later can succeed without user action
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::CoolingDown | Error::Busy | Error::Timeout { .. }
        )
    }
}
