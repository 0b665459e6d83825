//! Argument vectors for the external downloader

use crate::config::Settings;
use crate::types::{CommandSpec, Identifier};
use std::path::Path;

/// Flag that sets the tool's working (output) directory
pub const WORK_DIR_FLAG: &str = "--work-dir";

/// Flag that makes the tool prompt for login before downloading
pub const LOGIN_FLAG: &str = "--login";

/// Sub-command starting the interactive QR login
pub const LOGIN_SUBCOMMAND: &str = "login";

/// Flag requesting metadata only (used to probe the login state)
pub const INFO_FLAG: &str = "-info";

/// Composes argument vectors from an identifier and a settings snapshot
///
/// Stateless; every call builds a new [`CommandSpec`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    /// Download command for one identifier
    ///
    /// `<exe> <identifier> <extra flags without --work-dir> [--work-dir <save dir>] [--login]`
    ///
    /// Any `--work-dir` (and the value after it) inside `extra_flags` is
    /// dropped so the save directory is passed exactly once. `--login` is
    /// added only when login is required and the tool is not logged in.
    pub fn build(&self, identifier: &Identifier, settings: &Settings) -> CommandSpec {
        let mut args = vec![identifier.to_string()];

        args.extend(strip_work_dir(split_flags(&settings.extra_flags)));

        if !settings.save_directory.as_os_str().is_empty() {
            args.push(WORK_DIR_FLAG.to_string());
            args.push(settings.save_directory.display().to_string());
        }

        if settings.login_blocks_download() {
            args.push(LOGIN_FLAG.to_string());
        }

        CommandSpec::new(settings.executable_path.clone(), args)
    }

    /// `<exe> login`
    pub fn login_command(&self, executable: &Path) -> CommandSpec {
        CommandSpec::new(executable, vec![LOGIN_SUBCOMMAND.to_string()])
    }

    /// `<exe> -info <probe>`
    pub fn status_probe_command(&self, executable: &Path, probe: &str) -> CommandSpec {
        CommandSpec::new(executable, vec![INFO_FLAG.to_string(), probe.to_string()])
    }
}

/// Split a free-form flag string into words
///
/// Quoted sections stay one word (quotes removed); everything else splits on
/// whitespace. Unbalanced quotes fall back to a plain whitespace split.
pub fn split_flags(flags: &str) -> Vec<String> {
    shell_words::split(flags).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "extra flags are not shell-quoted, splitting on whitespace");
        flags.split_whitespace().map(String::from).collect()
    })
}

fn strip_work_dir(words: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(words.len());
    let mut words = words.into_iter();
    while let Some(word) = words.next() {
        if word == WORK_DIR_FLAG {
            // skip its value too (if any)
            words.next();
        } else {
            kept.push(word);
        }
    }
    kept
}
