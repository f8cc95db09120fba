//! 媒体处理模块
//!
//! 包含帧数据模型、解码器抽象和 `FFmpeg` 解码实现

mod decoder;
mod error;
pub mod ffmpeg;
mod frame;

pub use decoder::VideoDecoder;
pub use error::{OpenError, SeekError};
pub use ffmpeg::DecodeEngine;
pub use frame::{PixelFormat, Plane, VideoFrame, YuvView};
