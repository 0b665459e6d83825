//! Traits for launching and observing the external tool

use crate::types::CommandSpec;
use async_trait::async_trait;

/// A running instance of the external tool
///
/// Output from stdout and stderr arrives through one merged line stream in
/// the order it was read.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Next output line, or `None` once both streams are closed
    async fn next_line(&mut self) -> Option<String>;

    /// Wait for the process to exit
    ///
    /// Returns the exit code, or `None` when the process was killed by a
    /// signal or its status could not be read.
    async fn exit_code(&mut self) -> Option<i32>;

    /// Kill the process (no-op if it already exited)
    async fn terminate(&mut self);
}

/// Launches the external tool
///
/// # Examples
///
/// ```no_run
/// use bvdl::process::{CliProcessRunner, ProcessRunner};
/// use bvdl::types::CommandSpec;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runner = CliProcessRunner::new();
/// let cmd = CommandSpec::new("/opt/BBDown", vec!["login".to_string()]);
///
/// let mut handle = runner.run(&cmd).await?;
/// while let Some(line) = handle.next_line().await {
///     println!("{}", line);
/// }
/// println!("exit code: {:?}", handle.exit_code().await);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Start `command` with its output piped
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`](crate::Error::Launch) when the program
    /// cannot be started (missing file, permission denied, ...).
    async fn run(&self, command: &CommandSpec) -> crate::Result<Box<dyn ProcessHandle>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
