//! `FFmpeg` 解码后端
//!
//! 提供解码引擎、PTS 时钟以及 `FFmpeg` 帧与 [`crate::media::VideoFrame`] 的转换

mod clock;
pub(crate) mod convert;
mod ffmpeg_impl;

pub use clock::{PtsClock, PtsSource, rational_seconds};
pub use ffmpeg_impl::DecodeEngine;
