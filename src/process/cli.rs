//! Runner that spawns the real external tool

use super::traits::{ProcessHandle, ProcessRunner};
use crate::error::Error;
use crate::types::CommandSpec;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Windows process creation flag that suppresses the console window
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Spawns the external tool as a child process
///
/// stdout and stderr are both piped and drained by reader tasks into one
/// line channel, so the child never blocks on a full pipe. The child is
/// killed if its handle is dropped. On Windows no console window is shown.
#[derive(Clone, Copy, Debug, Default)]
pub struct CliProcessRunner;

impl CliProcessRunner {
    /// Create a new runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for CliProcessRunner {
    async fn run(&self, command: &CommandSpec) -> crate::Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        tracing::debug!(command = %command, "launching external tool");

        let mut child = cmd.spawn().map_err(|e| Error::Launch {
            program: command.program().to_path_buf(),
            reason: e.to_string(),
        })?;

        let (tx, lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, tx));
        }

        Ok(Box::new(CliProcessHandle { child, lines }))
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

struct CliProcessHandle {
    child: Child,
    lines: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl ProcessHandle for CliProcessHandle {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    async fn exit_code(&mut self) -> Option<i32> {
        match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to wait for external tool");
                None
            }
        }
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "kill failed (process may have exited already)");
        }
    }
}

// Reads raw lines so output that is not valid UTF-8 is decoded lossily
// instead of ending the stream.
async fn pump_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "output stream closed with error");
                break;
            }
        }
    }
}
