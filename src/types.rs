//! Core types for bvdl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Content identifier: the configured prefix followed by 10 alphanumerics
///
/// Normally produced by [`IdentifierExtractor`](crate::extract::IdentifierExtractor).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a string without validating it
    ///
    /// Used for probe identifiers and tests; user text should go through the
    /// extractor instead.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Sequence number of a submitted batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl BatchId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Argument vector for one invocation of the external tool
///
/// Built fresh for every invocation and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSpec {
    /// Create a command from a program and its arguments
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Executable to launch
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the executable
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// First argument (the identifier, `login` or `-info`)
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Full ordered vector: program followed by every argument
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Why a single download failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// The tool rejected the identifier's length
    IdentifierLength,
    /// The content no longer exists (deleted upstream)
    ContentNotFound,
    /// Forced login is enabled but the tool is not logged in
    LoginRequired,
    /// The tool could not be launched; carries the launch error message
    Launch(String),
    /// Non-zero exit with no recognised error output
    Other,
}

impl FailureReason {
    /// Whether the tool actually ran and reported a recognised error
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::IdentifierLength | Self::ContentNotFound)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentifierLength => f.write_str("identifier length incorrect"),
            Self::ContentNotFound => f.write_str("content has been removed"),
            Self::LoginRequired => f.write_str(
                "forced login is enabled but the tool is not logged in; \
                 log in or disable forced login to download in low quality",
            ),
            Self::Launch(message) => f.write_str(message),
            Self::Other => f.write_str("other reason"),
        }
    }
}

/// Result of one download attempt
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Identifier that was downloaded
    pub identifier: Identifier,
    /// Whether the download counts as successful
    pub success: bool,
    /// Every output line, in order (empty when the launch failed)
    pub output: Vec<String>,
    /// Classified reason, present exactly when `success` is false
    pub failure: Option<FailureReason>,
}

impl DownloadOutcome {
    /// Successful outcome
    pub fn succeeded(identifier: Identifier, output: Vec<String>) -> Self {
        Self {
            identifier,
            success: true,
            output,
            failure: None,
        }
    }

    /// Failed outcome
    pub fn failed(identifier: Identifier, output: Vec<String>, reason: FailureReason) -> Self {
        Self {
            identifier,
            success: false,
            output,
            failure: Some(reason),
        }
    }

    /// Output lines joined with newlines
    pub fn raw_output(&self) -> String {
        self.output.join("\n")
    }
}

/// Aggregate of one batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of successful downloads
    pub success_count: usize,
    /// Failed identifiers with their reasons, in processing order
    pub failures: Vec<(Identifier, FailureReason)>,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// When the batch finished (None while running)
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    /// Empty summary starting now
    pub fn new() -> Self {
        Self {
            success_count: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Count one outcome
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            let reason = outcome.failure.clone().unwrap_or(FailureReason::Other);
            self.failures.push((outcome.identifier.clone(), reason));
        }
    }

    /// Number of failed downloads
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of processed identifiers
    pub fn total(&self) -> usize {
        self.success_count + self.failures.len()
    }

    /// Stamp the end time and hand the summary out, leaving a fresh one behind
    pub fn finish(&mut self) -> RunSummary {
        self.finished_at = Some(Utc::now());
        std::mem::take(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Download summary:")?;
        writeln!(f, "Total: {}", self.total())?;
        writeln!(f, "Succeeded: {}", self.success_count)?;
        write!(f, "Failed: {}", self.failure_count())?;
        if !self.failures.is_empty() {
            write!(f, "\n\nFailures:")?;
            for (identifier, reason) in &self.failures {
                write!(f, "\n- {}: {}", identifier, reason)?;
            }
        }
        Ok(())
    }
}

/// Why a submitted batch was not processed at all
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRejection {
    /// The submitted text was blank
    EmptyInput,
    /// No identifier could be extracted from the text
    NoIdentifiers,
    /// Forced login is enabled but the tool is not logged in
    LoginRequired,
}

impl fmt::Display for BatchRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => f.write_str("no input: enter at least one identifier"),
            Self::NoIdentifiers => f.write_str("no valid identifier found"),
            Self::LoginRequired => {
                f.write_str("forced login is enabled: log in before downloading")
            }
        }
    }
}

/// Event delivered to the front-end through the event queue
///
/// Events are produced by the worker and the downloader facade only; the
/// consumer drains them from its own scheduling context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was accepted and identifiers were extracted
    BatchStarted {
        /// Batch number
        batch: BatchId,
        /// Identifiers in processing order
        identifiers: Vec<Identifier>,
    },

    /// A batch was refused without running anything
    BatchRejected {
        /// Batch number
        batch: BatchId,
        /// Why
        reason: BatchRejection,
    },

    /// The external tool is about to be launched for one identifier
    DownloadStarted {
        /// Batch number
        batch: BatchId,
        /// Identifier being downloaded
        identifier: Identifier,
    },

    /// One identifier finished (successfully or not)
    DownloadFinished {
        /// Batch number
        batch: BatchId,
        /// Outcome of the attempt
        outcome: DownloadOutcome,
    },

    /// Every identifier of a batch has been processed
    BatchFinished {
        /// Batch number
        batch: BatchId,
        /// Aggregated counts
        summary: RunSummary,
    },

    /// The persisted login state changed after a status probe
    LoginStatusChanged {
        /// New state
        logged_in: bool,
    },
}
