//! In-memory runner that replays canned output

use super::traits::{ProcessHandle, ProcessRunner};
use crate::error::Error;
use crate::types::CommandSpec;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Canned behavior for one launch
#[derive(Clone, Debug, Default)]
pub struct Script {
    /// Lines emitted in order
    pub lines: Vec<String>,
    /// Exit code reported after the last line (`None` = killed)
    pub exit_code: Option<i32>,
    /// Pause before each line
    pub line_delay: Duration,
    /// Keep the process "running" after the last line until terminated
    pub hold_open: bool,
    /// Fail the launch itself with this reason
    pub launch_error: Option<String>,
}

impl Script {
    /// Emit `lines` then exit with `exit_code`
    pub fn new<I, S>(lines: I, exit_code: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    /// A launch that fails before any output
    pub fn launch_failure(reason: impl Into<String>) -> Self {
        Self {
            launch_error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Keep the process alive after its output until it is terminated
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Pause before every line
    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }
}

/// Runner that never starts a real process
///
/// Scripts are keyed by the command's first argument (`login`, `-info`, or
/// an identifier). Several scripts for the same key are used in order and
/// the last one repeats. Commands without a matching key use the fallback
/// script (no output, exit code 0). Every launched command is recorded.
///
/// # Examples
///
/// ```
/// use bvdl::process::{ProcessRunner, Script, ScriptedRunner};
/// use bvdl::types::CommandSpec;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runner = ScriptedRunner::new().on("BV1234567890", Script::new(["任务完成"], 0));
/// let cmd = CommandSpec::new("BBDown", vec!["BV1234567890".to_string()]);
///
/// let mut handle = runner.run(&cmd).await?;
/// assert_eq!(handle.next_line().await.as_deref(), Some("任务完成"));
/// assert_eq!(handle.exit_code().await, Some(0));
/// assert_eq!(runner.launched().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    inner: Arc<Mutex<ScriptedState>>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    scripts: HashMap<String, VecDeque<Script>>,
    fallback: Script,
    launched: Vec<CommandSpec>,
}

impl ScriptedRunner {
    /// Runner where every command exits 0 silently
    pub fn new() -> Self {
        let runner = Self::default();
        runner.state().fallback = Script::new(Vec::<String>::new(), 0);
        runner
    }

    /// Queue a script for commands whose first argument is `first_arg`
    pub fn on(self, first_arg: impl Into<String>, script: Script) -> Self {
        self.push(first_arg, script);
        self
    }

    /// Queue a script on an existing (possibly shared) runner
    pub fn push(&self, first_arg: impl Into<String>, script: Script) {
        self.state()
            .scripts
            .entry(first_arg.into())
            .or_default()
            .push_back(script);
    }

    /// Script used for commands with no matching key
    pub fn fallback(self, script: Script) -> Self {
        self.state().fallback = script;
        self
    }

    /// Every command launched so far, in order
    pub fn launched(&self) -> Vec<CommandSpec> {
        self.state().launched.clone()
    }

    /// Number of launches whose first argument is `first_arg`
    pub fn launch_count(&self, first_arg: &str) -> usize {
        self.state()
            .launched
            .iter()
            .filter(|c| c.first_arg() == Some(first_arg))
            .count()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        // state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_script(&self, command: &CommandSpec) -> Script {
        let mut state = self.state();
        state.launched.push(command.clone());

        let key = command.first_arg().unwrap_or_default();
        match state.scripts.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => state.fallback.clone(),
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> crate::Result<Box<dyn ProcessHandle>> {
        let script = self.next_script(command);

        if let Some(reason) = script.launch_error {
            return Err(Error::Launch {
                program: command.program().to_path_buf(),
                reason,
            });
        }

        Ok(Box::new(ScriptedHandle {
            lines: script.lines.into(),
            exit_code: script.exit_code,
            line_delay: script.line_delay,
            hold_open: script.hold_open,
            terminated: false,
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedHandle {
    lines: VecDeque<String>,
    exit_code: Option<i32>,
    line_delay: Duration,
    hold_open: bool,
    terminated: bool,
}

#[async_trait]
impl ProcessHandle for ScriptedHandle {
    async fn next_line(&mut self) -> Option<String> {
        if self.terminated {
            return None;
        }
        if !self.line_delay.is_zero() && !self.lines.is_empty() {
            tokio::time::sleep(self.line_delay).await;
        }
        match self.lines.pop_front() {
            Some(line) => Some(line),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }

    async fn exit_code(&mut self) -> Option<i32> {
        if self.terminated {
            return None;
        }
        if self.hold_open {
            std::future::pending::<()>().await;
        }
        self.exit_code
    }

    async fn terminate(&mut self) {
        self.terminated = true;
        self.lines.clear();
    }
}
