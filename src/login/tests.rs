// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::LoginConfig;
use crate::error::Error;
use crate::process::{Script, ScriptedRunner};
use crate::store::SettingsStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

const QR_GENERATED: &str = "[2024-05-01 12:00:00.000] - 生成二维码成功：qrcode.png, 请打开并扫描";
const QR_EXPIRED: &str = "[2024-05-01 12:03:00.000] - 二维码已过期, 请重新执行登录指令";
const LOGIN_OK: &str = "[2024-05-01 12:01:00.000] - 登录成功: SESSDATA=xxx";

/// Workspace with an executable under `<root>/tools`, a separate home
/// directory and a settings store pointing at the executable
struct Fixture {
    root: TempDir,
    home: TempDir,
    store: SettingsStore,
}

impl Fixture {
    async fn new() -> Self {
        let root = tempdir().unwrap();
        let home = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("tools")).unwrap();

        let store = SettingsStore::open(root.path().join("bvconfig.json"))
            .await
            .unwrap();
        store
            .set_executable_path(root.path().join("tools").join("BBDown"))
            .await
            .unwrap();
        store.set_cached_probe_identifier("BV1234567890").await.unwrap();

        Self { root, home, store }
    }

    fn machine(&self, runner: &ScriptedRunner) -> LoginStateMachine {
        LoginStateMachine::new(
            Arc::new(runner.clone()),
            self.store.clone(),
            LoginConfig::default(),
        )
        .with_home_dir(Some(self.home.path().to_path_buf()))
    }

    fn qr_paths(&self) -> Vec<std::path::PathBuf> {
        vec![
            self.root.path().join("qrcode.png"),
            self.root.path().join("tools").join("qrcode.png"),
            self.home.path().join("qrcode.png"),
        ]
    }

    fn write_qr_files(&self) {
        for path in self.qr_paths() {
            std::fs::write(path, b"png").unwrap();
        }
    }

    fn qr_files_left(&self) -> usize {
        self.qr_paths().iter().filter(|p| p.exists()).count()
    }
}

#[tokio::test(start_paused = true)]
async fn test_qr_expiry_then_retry_relaunches() {
    let fx = Fixture::new().await;
    fx.write_qr_files();
    let runner = ScriptedRunner::new().on(
        "login",
        Script::new([QR_GENERATED, "██  ████  ██", QR_EXPIRED], 0).held_open(),
    );
    let mut login = fx.machine(&runner);
    assert_eq!(login.phase(), LoginPhase::Idle);

    login.start().await.unwrap();
    assert_eq!(login.phase(), LoginPhase::AwaitingQr);

    let ready = login.next_message().await.unwrap();
    assert_eq!(
        ready,
        LoginMessage::QrReady {
            image: Some(fx.root.path().join("qrcode.png"))
        }
    );
    assert_eq!(login.phase(), LoginPhase::QrDisplayed);

    assert_eq!(login.next_message().await, Some(LoginMessage::QrExpired));
    assert_eq!(login.phase(), LoginPhase::QrExpired);
    assert_eq!(fx.qr_files_left(), 0, "expiry must delete every QR candidate");

    login.retry().await.unwrap();
    assert_eq!(login.phase(), LoginPhase::AwaitingQr);
    assert_eq!(runner.launch_count("login"), 2);
    assert_eq!(
        runner.launched()[1].argv(),
        [
            fx.root.path().join("tools").join("BBDown").display().to_string(),
            "login".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unverified_success_fails() {
    let fx = Fixture::new().await;
    fx.write_qr_files();
    let runner = ScriptedRunner::new()
        .on("login", Script::new([QR_GENERATED, LOGIN_OK], 0))
        .on("-info", Script::new(["尚未登录"], 0));
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    let mut messages = Vec::new();
    while let Some(message) = login.next_message().await {
        messages.push(message);
    }

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1], LoginMessage::Verifying);
    assert_eq!(
        messages[2],
        LoginMessage::LoginFailed {
            reason: VERIFICATION_FAILED.to_string()
        }
    );
    assert_eq!(login.phase(), LoginPhase::Failed);
    assert!(!login.is_logged_in());
    assert!(!fx.store.load().await.unwrap().is_logged_in);
    assert_eq!(fx.qr_files_left(), 0);

    let probe = &runner.launched()[1];
    assert_eq!(probe.args(), ["-info", "BV1234567890"]);
}

#[tokio::test(start_paused = true)]
async fn test_verified_success_logs_in_and_persists() {
    let fx = Fixture::new().await;
    fx.write_qr_files();
    let runner = ScriptedRunner::new()
        .on("login", Script::new([QR_GENERATED, LOGIN_OK], 0).held_open())
        .on("-info", Script::new(["加载本地cookie...", "获取aid..."], 0));
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    while login.next_message().await.is_some() {}

    assert_eq!(login.phase(), LoginPhase::LoggedIn);
    assert!(login.is_logged_in());
    assert!(login.is_finished());
    assert!(fx.store.load().await.unwrap().is_logged_in);
    assert_eq!(fx.qr_files_left(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_before_qr_goes_straight_to_verification() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new()
        .on("login", Script::new([LOGIN_OK], 0))
        .on("-info", Script::new(["获取aid..."], 0));
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    assert_eq!(login.next_message().await, Some(LoginMessage::Verifying));
    assert_eq!(login.phase(), LoginPhase::VerifyingSuccess);
    assert_eq!(login.next_message().await, Some(LoginMessage::LoginSucceeded));
}

#[tokio::test(start_paused = true)]
async fn test_poll_drains_in_order_without_waiting() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new().on("login", Script::new([QR_GENERATED, QR_EXPIRED], 0));
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    assert!(login.poll().is_empty(), "settle delay has not elapsed yet");

    tokio::time::sleep(Duration::from_secs(1)).await;
    let drained = login.poll();

    assert_eq!(
        drained,
        vec![LoginMessage::QrReady { image: None }, LoginMessage::QrExpired]
    );
    assert_eq!(login.phase(), LoginPhase::QrExpired);
}

#[tokio::test(start_paused = true)]
async fn test_process_exit_without_result_fails() {
    let fx = Fixture::new().await;
    fx.write_qr_files();
    let runner = ScriptedRunner::new().on("login", Script::new(["starting..."], 1));
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();

    assert_eq!(
        login.next_message().await,
        Some(LoginMessage::LoginFailed {
            reason: PROCESS_EXITED.to_string()
        })
    );
    assert_eq!(login.phase(), LoginPhase::Failed);
    assert_eq!(fx.qr_files_left(), 0, "stale QR images must be removed");
    assert_eq!(login.next_message().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_deletes_qr_and_discards_messages() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new().on("login", Script::new([QR_GENERATED], 0).held_open());
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    fx.write_qr_files();
    assert!(matches!(
        login.next_message().await,
        Some(LoginMessage::QrReady { image: Some(_) })
    ));

    login.cancel();

    assert_eq!(login.phase(), LoginPhase::Failed);
    assert_eq!(fx.qr_files_left(), 0);
    assert!(login.poll().is_empty());
    assert_eq!(login.next_message().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_external_cancellation_reports_failure() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new().on("login", Script::new([QR_GENERATED], 0).held_open());
    let mut login = fx.machine(&runner);

    login.start().await.unwrap();
    login.next_message().await.unwrap();

    login.cancellation_token().cancel();

    assert_eq!(
        login.next_message().await,
        Some(LoginMessage::LoginFailed {
            reason: LOGIN_CANCELLED.to_string()
        })
    );
    assert_eq!(login.phase(), LoginPhase::Failed);
}

#[tokio::test]
async fn test_launch_failure_fails_the_attempt() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new().on("login", Script::launch_failure("permission denied"));
    let mut login = fx.machine(&runner);

    let result = login.start().await;

    assert!(matches!(result, Err(Error::Launch { .. })));
    assert_eq!(login.phase(), LoginPhase::Failed);
    match login.poll().as_slice() {
        [LoginMessage::LoginFailed { reason }] => assert!(reason.contains("permission denied")),
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_executable_is_not_launched() {
    let fx = Fixture::new().await;
    fx.store.set_executable_path("").await.unwrap();
    let runner = ScriptedRunner::new();
    let mut login = fx.machine(&runner);

    assert!(matches!(login.start().await, Err(Error::NotFound(_))));
    assert!(runner.launched().is_empty());
    assert!(login.is_finished());
}

#[tokio::test]
async fn test_retry_and_start_are_phase_checked() {
    let fx = Fixture::new().await;
    let runner = ScriptedRunner::new().on("login", Script::new([QR_GENERATED], 0).held_open());
    let mut login = fx.machine(&runner);

    assert!(matches!(
        login.retry().await,
        Err(Error::InvalidState { ref operation, .. }) if operation == "retry"
    ));

    login.start().await.unwrap();
    assert!(matches!(
        login.start().await,
        Err(Error::InvalidState { ref phase, .. }) if phase == "awaiting QR code"
    ));
    assert_eq!(runner.launch_count("login"), 1);
}

#[cfg(unix)]
#[test]
fn test_qr_locator_matches_fixture_layout() {
    let locator = QrLocator::new(
        Path::new("/apps/bv/tools/BBDown"),
        Some(Path::new("/home/me")),
        "qrcode.png",
    );
    assert_eq!(
        locator.candidates(),
        [
            Path::new("/apps/bv/qrcode.png"),
            Path::new("/apps/bv/tools/qrcode.png"),
            Path::new("/home/me/qrcode.png"),
        ]
    );
}
