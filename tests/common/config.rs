//! Test environment setup: settings in a tempdir plus the fake tool

use super::fixtures::FAKE_TOOL_SCRIPT;
use bvdl::config::{LoginConfig, QueueConfig};
use bvdl::{BvDownloader, Config, Events};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Everything a test needs, kept alive together
pub struct TestEnv {
    /// Downloader wired to the real process runner
    pub downloader: BvDownloader,
    /// Its event queue
    pub events: Events,
    /// Path of the fake tool
    pub tool: PathBuf,
    /// Directory videos are written to
    pub save_dir: PathBuf,
    /// Owns every file the test creates
    pub root: TempDir,
}

impl TestEnv {
    /// Directory holding the fake tool (and the QR image it writes)
    pub fn tool_dir(&self) -> &Path {
        self.tool.parent().unwrap_or_else(|| self.root.path())
    }

    /// Lines the fake tool logged, one per invocation
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.tool_dir().join(super::fixtures::INVOCATION_LOG))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Write the fake tool into `dir` and mark it executable
#[cfg(unix)]
pub fn install_fake_tool(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).expect("create tool dir");
    let tool = dir.join("BBDown");
    std::fs::write(&tool, FAKE_TOOL_SCRIPT).expect("write fake tool");
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake tool");
    tool
}

/// Build a downloader whose settings point at the fake tool
///
/// Login is not required, the cooldown is short and the QR search never
/// leaves the tempdir.
#[cfg(unix)]
pub async fn create_test_env() -> TestEnv {
    let root = tempfile::tempdir().expect("tempdir");
    let tool = install_fake_tool(&root.path().join("bin"));
    let save_dir = root.path().join("videos");
    let home = root.path().join("home");
    std::fs::create_dir_all(&home).expect("create home");

    let config = Config {
        settings_path: root.path().join("BVDownloader").join("bvconfig.json"),
        login: LoginConfig {
            settle_delay: Duration::from_millis(50),
            qr_home_dir: Some(home),
            ..LoginConfig::default()
        },
        queue: QueueConfig {
            cooldown: Duration::from_millis(100),
        },
        ..Config::default()
    };

    let (downloader, events) = BvDownloader::new(config).await.expect("create downloader");
    downloader
        .store()
        .update(|s| {
            s.executable_path = tool.clone();
            s.save_directory = save_dir.clone();
            s.requires_login = false;
            s.extra_flags = "-p ALL --skip-ai=false".to_string();
        })
        .await
        .expect("write settings");

    TestEnv {
        downloader,
        events,
        tool,
        save_dir,
        root,
    }
}
