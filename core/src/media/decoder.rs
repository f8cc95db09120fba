//! 视频解码器抽象
//!
//! 播放器只依赖 `VideoDecoder` trait，`FFmpeg` 实现见 [`super::ffmpeg`]

use super::{PixelFormat, SeekError, VideoFrame};

/// 视频解码器 trait
///
/// 所有视频解码器实现都需要实现此 trait
pub trait VideoDecoder {
    /// 解码下一帧
    ///
    /// 返回 `Some(VideoFrame)` 表示成功解码一帧；
    /// 返回 `None` 表示已到达文件末尾，在下一次跳转前会一直返回 `None`
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// 最近一次有效的显示时间（秒）
    fn current_pts(&self) -> f64;

    /// 跳转到指定时间（秒），落在目标之前最近的关键帧
    ///
    /// # Errors
    ///
    /// 目标无效或后端跳转失败时返回错误，此时时钟与读取位置不变
    fn seek(&mut self, target_seconds: f64) -> Result<(), SeekError>;

    /// 总时长（秒），未知时为 0
    fn duration(&self) -> f64;

    /// 获取视频宽度
    fn width(&self) -> u32;

    /// 获取视频高度
    fn height(&self) -> u32;

    /// 输出帧的像素格式
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Yuv420p
    }

    /// 相邻两帧的间隔（秒），未知时为 `None`
    fn frame_interval(&self) -> Option<f64>;
}
