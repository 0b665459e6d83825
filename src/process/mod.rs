//! Launching the external downloader
//!
//! The [`ProcessRunner`] trait is the seam between the download/login logic
//! and the operating system. Two implementations are provided:
//!
//! - [`CliProcessRunner`]: spawns the real tool with piped output
//! - [`ScriptedRunner`]: replays canned output without starting anything,
//!   for tests and for front-ends exercising their flows offline

mod cli;
mod scripted;
mod traits;

pub use cli::CliProcessRunner;
pub use scripted::{Script, ScriptedRunner};
pub use traits::{ProcessHandle, ProcessRunner};
