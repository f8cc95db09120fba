//! 无窗口显示端：统计帧数，按需保留最后一帧用于截图

use std::path::Path;

use anyhow::{Context, Result};
use lumaplay::player::FrameSink;
use lumaplay::{PixelFormat, VideoFrame};
use tracing::debug;

/// 无窗口显示端
#[derive(Debug, Default)]
pub struct HeadlessSink {
    presented: u64,
    keep_last: bool,
    last: Option<VideoFrame>,
}

impl HeadlessSink {
    /// 创建显示端，`keep_last` 为真时复制保留最后一帧
    #[must_use]
    pub fn new(keep_last: bool) -> Self {
        Self {
            keep_last,
            ..Self::default()
        }
    }

    /// 已显示的帧数
    #[must_use]
    pub const fn presented(&self) -> u64 {
        self.presented
    }

    /// 把最后一帧保存为 PNG
    ///
    /// # Errors
    ///
    /// - 还没有显示过任何帧
    /// - 写文件失败
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let frame = self
            .last
            .as_ref()
            .context("没有可保存的帧")?
            .to_format(PixelFormat::Rgb24)
            .context("转换为 RGB 失败")?;
        let plane = frame.plane(0);
        let rgb = image::RgbImage::from_raw(frame.width(), frame.height(), plane.data().to_vec())
            .context("帧缓冲区尺寸不符")?;
        rgb.save(path)
            .with_context(|| format!("保存截图失败: {}", path.display()))?;
        Ok(())
    }
}

impl FrameSink for HeadlessSink {
    fn present(&mut self, frame: &VideoFrame, position: f64, duration: f64) {
        self.presented += 1;
        debug!(
            n = self.presented,
            position = format_args!("{position:.3}"),
            duration = format_args!("{duration:.3}"),
            "{}x{}",
            frame.width(),
            frame.height()
        );
        if self.keep_last {
            self.last = Some(frame.clone());
        }
    }
}
