//! # bvdl
//!
//! Headless core of a batch video downloader that drives an external
//! downloader command-line tool (BBDown).
//!
//! ## Design Philosophy
//!
//! bvdl is designed to be:
//! - **Library-first** - No GUI, the front-end is whatever embeds the crate
//! - **Sequential** - One batch at a time, one download at a time, in order
//! - **Queue-driven** - Results and login progress are messages the consumer
//!   drains on its own schedule; nothing calls back into UI code
//! - **Snapshot-based** - Every operation reads a fresh copy of the
//!   persisted settings instead of sharing mutable state
//!
//! ## Quick Start
//!
//! ```no_run
//! use bvdl::{BvDownloader, Config, Event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (downloader, mut events) = BvDownloader::new(Config::default()).await?;
//!     downloader.ensure_executable().await?;
//!     downloader.refresh_login_status().await?;
//!
//!     downloader
//!         .submit("https://www.bilibili.com/video/BV1xx411c7mD")
//!         .await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!         if matches!(event, Event::BatchFinished { .. } | Event::BatchRejected { .. }) {
//!             break;
//!         }
//!     }
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Argument vectors for the external tool
pub mod command;
/// Configuration types
pub mod config;
/// Downloader facade
pub mod downloader;
/// Error types
pub mod error;
/// Identifier extraction
pub mod extract;
/// Interactive login state machine
pub mod login;
/// Process launching
pub mod process;
/// Persisted settings document
pub mod store;
/// Single-download supervision
pub mod supervisor;
/// Executable discovery
pub mod tools;
/// Core types and events
pub mod types;
/// Sequential batch worker
pub mod worker;

// Re-export commonly used types
pub use command::CommandBuilder;
pub use config::{Config, LoginConfig, Markers, QueueConfig, Settings};
pub use downloader::{BvDownloader, Events};
pub use error::{Error, Result};
pub use extract::IdentifierExtractor;
pub use login::{LoginMessage, LoginPhase, LoginStateMachine, QrLocator, StatusProbe};
pub use process::{CliProcessRunner, ProcessHandle, ProcessRunner, Script, ScriptedRunner};
pub use store::SettingsStore;
pub use supervisor::DownloadSupervisor;
pub use types::{
    BatchId, BatchRejection, CommandSpec, DownloadOutcome, Event, FailureReason, Identifier,
    RunSummary,
};
pub use worker::{SubmissionGate, TaskQueueWorker};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bvdl::{BvDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (downloader, events) = BvDownloader::new(Config::default()).await?;
///
///     // hand `events` to the front-end, then block until a signal arrives
///     # drop(events);
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BvDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
