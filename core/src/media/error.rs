//! 解码引擎错误类型

use std::path::PathBuf;

use ffmpeg_next as ffmpeg;
use thiserror::Error;

/// 打开媒体源失败
///
/// 任一变体都意味着没有产生可用的解码引擎实例
#[derive(Debug, Error)]
pub enum OpenError {
    /// 文件不存在或不是普通文件
    #[error("文件不存在: {}", .0.display())]
    NoSuchFile(PathBuf),
    /// `FFmpeg` 初始化失败
    #[error("FFmpeg 初始化失败: {0}")]
    BackendInit(#[source] ffmpeg::Error),
    /// 无法识别或解封装容器
    #[error("无法打开容器 {}: {source}", .path.display())]
    InvalidContainer {
        /// 文件路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: ffmpeg::Error,
    },
    /// 容器中没有视频流
    #[error("未找到视频流")]
    NoVideoStream,
    /// 找不到对应编解码器的解码器
    #[error("不支持的编解码器: {0:?}")]
    UnsupportedCodec(ffmpeg::codec::Id),
    /// 解码器上下文创建或打开失败
    #[error("无法初始化解码器: {0}")]
    DecoderInitFailed(#[source] ffmpeg::Error),
}

/// 跳转失败
///
/// 返回该错误时 PTS 时钟与读取位置保持调用前的状态
#[derive(Debug, Error)]
pub enum SeekError {
    /// 目标时间不是有限数
    #[error("无效的跳转目标: {0}")]
    InvalidTarget(f64),
    /// 后端跳转失败
    #[error("跳转到 {target:.3}s 失败: {source}")]
    Backend {
        /// 钳制后的目标时间（秒）
        target: f64,
        /// 底层错误
        #[source]
        source: ffmpeg::Error,
    },
}
