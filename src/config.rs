//! Configuration types for bvdl
//!
//! Two layers live here:
//! - [`Settings`]: the user-editable document persisted on disk and owned by
//!   [`SettingsStore`](crate::store::SettingsStore). Every operation receives a
//!   fresh snapshot of it.
//! - [`Config`]: static wiring for one [`BvDownloader`](crate::BvDownloader)
//!   instance (where the settings live, tool output markers, timings).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Directory name used under the platform data/desktop directories
pub const APP_DIR_NAME: &str = "BVDownloader";

/// File name of the persisted settings document
pub const SETTINGS_FILE_NAME: &str = "bvconfig.json";

/// Persisted settings document
///
/// Missing fields are filled from defaults on load, so documents written by
/// older versions keep working.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the external downloader executable (empty = not configured)
    #[serde(default)]
    pub executable_path: PathBuf,

    /// Identifier passed to `-info` when probing the login state
    #[serde(default = "default_probe_identifier")]
    pub cached_probe_identifier: String,

    /// Free-form flags appended to every download command
    #[serde(default = "default_extra_flags")]
    pub extra_flags: String,

    /// Last known login state of the external tool
    #[serde(default)]
    pub is_logged_in: bool,

    /// Refuse to download unless logged in (high quality mode)
    #[serde(default = "default_true")]
    pub requires_login: bool,

    /// Directory handed to the tool as its working directory
    #[serde(default = "default_save_directory")]
    pub save_directory: PathBuf,

    /// Identifier prefix recognised by the extractor (default: "BV")
    #[serde(default = "default_identifier_prefix")]
    pub identifier_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable_path: PathBuf::new(),
            cached_probe_identifier: default_probe_identifier(),
            extra_flags: default_extra_flags(),
            is_logged_in: false,
            requires_login: true,
            save_directory: default_save_directory(),
            identifier_prefix: default_identifier_prefix(),
        }
    }
}

impl Settings {
    /// Whether downloads must be refused because login is forced but absent
    pub fn login_blocks_download(&self) -> bool {
        self.requires_login && !self.is_logged_in
    }

    /// Whether an executable path has been configured at all
    pub fn has_executable(&self) -> bool {
        !self.executable_path.as_os_str().is_empty()
    }
}

/// Substrings the external tool prints on stdout
///
/// The defaults match the tool's own (Chinese) locale. They are plain
/// substrings, matched case-insensitively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Markers {
    /// A download finished
    #[serde(default = "default_task_complete")]
    pub task_complete: String,

    /// The login QR image has been written
    #[serde(default = "default_qr_generated")]
    pub qr_generated: String,

    /// The login QR code expired before being scanned
    #[serde(default = "default_qr_expired")]
    pub qr_expired: String,

    /// The tool reports a successful login
    #[serde(default = "default_login_succeeded")]
    pub login_succeeded: String,

    /// Status probe output meaning "no session"
    #[serde(default = "default_not_logged_in")]
    pub not_logged_in: Vec<String>,

    /// Status probe output meaning "stored session was used"
    #[serde(default = "default_session_loaded")]
    pub session_loaded: Vec<String>,

    /// The requested content does not exist (deleted video)
    #[serde(default = "default_content_not_found")]
    pub content_not_found: String,

    /// The identifier was rejected for its length
    #[serde(default = "default_identifier_length_error")]
    pub identifier_length_error: String,

    /// Block character used to draw the QR code in the terminal
    #[serde(default = "default_qr_art")]
    pub qr_art: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            task_complete: default_task_complete(),
            qr_generated: default_qr_generated(),
            qr_expired: default_qr_expired(),
            login_succeeded: default_login_succeeded(),
            not_logged_in: default_not_logged_in(),
            session_loaded: default_session_loaded(),
            content_not_found: default_content_not_found(),
            identifier_length_error: default_identifier_length_error(),
            qr_art: default_qr_art(),
        }
    }
}

impl Markers {
    /// Case-insensitive substring test; an empty marker never matches
    pub fn line_has(line: &str, marker: &str) -> bool {
        !marker.is_empty() && line.to_lowercase().contains(&marker.to_lowercase())
    }

    /// Whether `line` reports a finished download
    pub fn is_task_complete(&self, line: &str) -> bool {
        Self::line_has(line, &self.task_complete)
    }

    /// Whether `line` is part of the QR code drawn in the terminal
    pub fn is_qr_art(&self, line: &str) -> bool {
        Self::line_has(line, &self.qr_art)
    }
}

/// Timings and file names for the interactive login flow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Pause after a QR/success marker so the tool can finish writing files
    #[serde(default = "default_settle_delay", with = "duration_ms_serde")]
    pub settle_delay: Duration,

    /// Hard deadline for the `-info` status probe (default: 3s)
    #[serde(default = "default_verify_timeout", with = "duration_ms_serde")]
    pub verify_timeout: Duration,

    /// Name of the QR image the tool writes
    #[serde(default = "default_qr_file_name")]
    pub qr_file_name: String,

    /// Last directory searched for the QR image (None = the user's home)
    #[serde(default)]
    pub qr_home_dir: Option<PathBuf>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            settle_delay: default_settle_delay(),
            verify_timeout: default_verify_timeout(),
            qr_file_name: default_qr_file_name(),
            qr_home_dir: None,
        }
    }
}

/// Batch queue behavior
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum pause between the end of one batch and the next submission
    #[serde(default = "default_cooldown", with = "duration_ms_serde")]
    pub cooldown: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
        }
    }
}

/// Main configuration for a [`BvDownloader`](crate::BvDownloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Where the [`Settings`] document is stored
    #[serde(default = "default_settings_file")]
    pub settings_path: PathBuf,

    /// Output markers of the external tool
    #[serde(default)]
    pub markers: Markers,

    /// Login flow timings
    #[serde(default)]
    pub login: LoginConfig,

    /// Batch queue behavior
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: default_settings_file(),
            markers: Markers::default(),
            login: LoginConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Platform location of the settings document
///
/// `<local data dir>/BVDownloader/bvconfig.json`, e.g.
/// `C:\Users\me\AppData\Local\BVDownloader\bvconfig.json` on Windows.
pub fn default_settings_path() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| Error::Config {
        message: "could not determine the local data directory".to_string(),
        key: Some("settings_path".to_string()),
    })?;
    Ok(base.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

fn default_settings_file() -> PathBuf {
    default_settings_path().unwrap_or_else(|_| PathBuf::from(SETTINGS_FILE_NAME))
}

fn default_save_directory() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join("Desktop").join(APP_DIR_NAME),
        None => PathBuf::from(APP_DIR_NAME),
    }
}

fn default_probe_identifier() -> String {
    "BVaaaabbddee123".to_string()
}

fn default_extra_flags() -> String {
    concat!(
        "--show-all ",
        "--dfn-priority \"杜比视界,8K 超高清,HDR 真彩,4K 超清,1080P 60帧,1080P 高码率,1080P 高清,720P 高清,480P 清晰,360P 流畅\" ",
        "--download-danmaku ",
        "-F \"<videoTitle>[<ownerName>][<dfn><fps>][<bvid>][P<pageNumber>_<pageTitle>]\" ",
        "-p ALL --save-archives-to-file --skip-ai=false --delay-per-page=2"
    )
    .to_string()
}

fn default_identifier_prefix() -> String {
    "BV".to_string()
}

fn default_true() -> bool {
    true
}

fn default_task_complete() -> String {
    "任务完成".to_string()
}

fn default_qr_generated() -> String {
    "生成二维码成功".to_string()
}

fn default_qr_expired() -> String {
    "二维码已过期".to_string()
}

fn default_login_succeeded() -> String {
    "登录成功".to_string()
}

fn default_not_logged_in() -> Vec<String> {
    vec!["尚未登录".to_string(), "未登录".to_string()]
}

fn default_session_loaded() -> Vec<String> {
    vec!["加载本地cookie".to_string(), "获取aid".to_string()]
}

fn default_content_not_found() -> String {
    "未找到此".to_string()
}

fn default_identifier_length_error() -> String {
    "must to be 12 char".to_string()
}

fn default_qr_art() -> String {
    "██".to_string()
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_verify_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_qr_file_name() -> String {
    "qrcode.png".to_string()
}

fn default_cooldown() -> Duration {
    Duration::from_secs(1)
}

// Durations are stored as whole milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
