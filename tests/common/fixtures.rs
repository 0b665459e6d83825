//! Fake downloader tool used by the end-to-end tests

/// Identifier the fake tool treats as missing content
pub const MISSING_IDENTIFIER: &str = "BV0000000000";

/// File the fake tool appends its arguments to, next to the script
pub const INVOCATION_LOG: &str = "invocations.log";

/// POSIX shell stand-in for BBDown
///
/// - `login` prints the QR and success markers and writes `qrcode.png`
///   next to itself
/// - `-info` prints a "session loaded" line
/// - [`MISSING_IDENTIFIER`] fails with the not-found marker on stderr
/// - any other identifier writes `<work dir>/<identifier>.mp4` and prints
///   the completion marker
pub const FAKE_TOOL_SCRIPT: &str = r#"#!/bin/sh
dir=$(cd "$(dirname "$0")" && pwd)
echo "$@" >> "$dir/invocations.log"

case "$1" in
  login)
    echo "[2024-01-01 00:00:00.000] - 获取登录地址..."
    printf 'png' > "$dir/qrcode.png"
    echo "[2024-01-01 00:00:00.100] - 生成二维码成功：qrcode.png, 请打开并扫描"
    echo "  ██████  ██  ██████"
    echo "[2024-01-01 00:00:01.000] - 登录成功: SESSDATA=fake"
    exit 0
    ;;
  -info)
    echo "[2024-01-01 00:00:00.000] - 加载本地cookie..."
    echo "[2024-01-01 00:00:00.100] - 获取aid..."
    exit 0
    ;;
  BV0000000000)
    echo "[2024-01-01 00:00:00.000] - 未找到此视频" 1>&2
    exit 1
    ;;
esac

workdir=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--work-dir" ]; then
    workdir="$arg"
  fi
  prev="$arg"
done

if [ -n "$workdir" ]; then
  mkdir -p "$workdir"
  printf 'video' > "$workdir/$1.mp4"
fi
echo "[2024-01-01 00:00:02.000] - 任务完成"
exit 0
"#;
