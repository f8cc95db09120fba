//! 日志初始化
//!
//! 核心组件只使用 `tracing` 宏并携带各自的 span，不依赖全局日志对象；
//! 由可执行程序决定是否安装订阅者。

use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, fmt};

/// 未设置 `RUST_LOG` 时的日志级别
pub const DEFAULT_DIRECTIVE: &str = "info";

/// 只显示 `HH:MM:SS.微秒`（UTC）的时间格式
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockTime;

impl ClockTime {
    /// 把自 UNIX 纪元起的时长格式化为一天内的时刻
    pub fn write_since_epoch(w: &mut impl std::fmt::Write, since_epoch: Duration) -> std::fmt::Result {
        let total = since_epoch.as_secs();
        write!(
            w,
            "{:02}:{:02}:{:02}.{:06}",
            (total / 3600) % 24,
            (total / 60) % 60,
            total % 60,
            since_epoch.subsec_micros()
        )
    }
}

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut buf = String::with_capacity(15);
        Self::write_since_epoch(&mut buf, now)?;
        w.write_str(&buf)
    }
}

/// 安装全局日志订阅者
///
/// 日志级别由环境变量 `RUST_LOG` 控制，未设置时为 `default_directive`
///
/// ```bash
/// RUST_LOG=debug lumaplay-cli video.mkv
/// RUST_LOG=lumaplay::filters=debug lumaplay-cli video.mkv
/// ```
///
/// 已安装过订阅者时不做任何事
pub fn init_logging(default_directive: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(true)
        .with_timer(ClockTime)
        .compact()
        .try_init();
    if installed.is_err() {
        tracing::debug!("日志订阅者已存在");
    }
}
