//! Locating the external downloader executable

use std::path::{Path, PathBuf};

/// Base name of the external downloader
pub const TOOL_NAME: &str = "BBDown";

/// Sub-directory of the application directory that may hold the tool
pub const TOOLS_DIR_NAME: &str = "tools";

/// File names tried in every candidate directory, in order
pub fn executable_file_names() -> [String; 2] {
    let ext = std::env::consts::EXE_SUFFIX;
    [
        format!("{}{}", TOOL_NAME, ext),
        format!("{}{}", TOOL_NAME.to_lowercase(), ext),
    ]
}

/// Search order for the downloader executable
///
/// 1. the configured path, when it exists
/// 2. the settings directory
/// 3. the application directory
/// 4. `<application directory>/tools`
/// 5. `PATH` (via `which`)
#[derive(Clone, Debug, Default)]
pub struct ExecutableSearch {
    /// Directory holding the settings document
    pub config_dir: Option<PathBuf>,
    /// Directory of the running application
    pub app_dir: Option<PathBuf>,
    /// Fall back to a `PATH` lookup
    pub use_path: bool,
}

impl ExecutableSearch {
    /// Search rooted at the settings directory and the current executable
    pub fn new(config_dir: Option<&Path>) -> Self {
        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            config_dir: config_dir.map(Path::to_path_buf),
            app_dir,
            use_path: true,
        }
    }

    /// Directories searched, in priority order
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(config_dir) = &self.config_dir {
            dirs.push(config_dir.clone());
        }
        if let Some(app_dir) = &self.app_dir {
            dirs.push(app_dir.clone());
            dirs.push(app_dir.join(TOOLS_DIR_NAME));
        }
        dirs
    }

    /// First usable executable, starting with `configured`
    pub fn find(&self, configured: &Path) -> Option<PathBuf> {
        if !configured.as_os_str().is_empty() && configured.is_file() {
            return Some(configured.to_path_buf());
        }

        let names = executable_file_names();
        let found = self
            .candidate_dirs()
            .into_iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file());
        if found.is_some() {
            return found;
        }

        if self.use_path {
            return names.iter().find_map(|name| which::which(name).ok());
        }
        None
    }
}

/// Find the downloader, preferring the configured path
///
/// Returns `None` when no candidate exists.
pub fn discover_executable(configured: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    let found = ExecutableSearch::new(config_dir).find(configured);
    match &found {
        Some(path) => tracing::debug!(path = %path.display(), "found downloader executable"),
        None => tracing::warn!("downloader executable not found"),
    }
    found
}
