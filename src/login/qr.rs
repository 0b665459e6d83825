//! Where the tool writes its login QR image

use std::path::{Path, PathBuf};

/// Candidate locations of the QR image, in priority order
///
/// The tool writes the image next to the application it was bundled with,
/// next to itself, or into the user's home directory depending on how it
/// was started:
///
/// 1. install directory: the parent of the executable's directory when that
///    directory is named like `tools`, otherwise the executable's directory
/// 2. the executable's directory
/// 3. the home directory
///
/// Duplicates are removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrLocator {
    candidates: Vec<PathBuf>,
}

impl QrLocator {
    /// Build the candidate list for `executable`
    pub fn new(executable: &Path, home: Option<&Path>, file_name: &str) -> Self {
        let executable = std::path::absolute(executable).unwrap_or_else(|_| executable.to_path_buf());

        let mut dirs = Vec::with_capacity(3);
        if let Some(exe_dir) = executable.parent() {
            let in_tools_dir = exe_dir
                .file_name()
                .is_some_and(|name| name.to_string_lossy().to_lowercase().contains("tools"));
            let install_dir = match exe_dir.parent() {
                Some(parent) if in_tools_dir => parent,
                _ => exe_dir,
            };
            dirs.push(install_dir.to_path_buf());
            dirs.push(exe_dir.to_path_buf());
        }
        if let Some(home) = home {
            dirs.push(home.to_path_buf());
        }

        let mut candidates: Vec<PathBuf> = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let candidate = dir.join(file_name);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        Self { candidates }
    }

    /// Candidates for `executable` with the current user's home directory
    pub fn for_executable(executable: &Path, file_name: &str) -> Self {
        Self::new(executable, dirs::home_dir().as_deref(), file_name)
    }

    /// Every candidate path, in priority order
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists
    pub fn find(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }

    /// Delete every existing candidate; returns how many were removed
    ///
    /// Failures are logged and skipped.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        for path in self.candidates.iter().filter(|p| p.is_file()) {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed QR image");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove QR image")
                }
            }
        }
        removed
    }
}
