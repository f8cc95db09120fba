//! # lumaplay
//!
//! 单路视频播放器核心：
//!
//! - `media`：解码引擎（`FFmpeg` 解封装 + 解码 + PTS 时钟 + 跳转）
//! - `filters`：滤镜描述与可热重建的滤镜图管理器
//! - `player`：播放控制（暂停、跳转、逐帧、滤镜开关）与帧节奏
//! - `config` / `logging`：TOML 配置与日志初始化

pub mod config;
pub mod filters;
pub mod logging;
pub mod media;
pub mod player;

pub use filters::{Filter, FilterError, FilterGraphManager, FilterOutcome};
pub use media::{DecodeEngine, OpenError, PixelFormat, SeekError, VideoDecoder, VideoFrame};
pub use player::{FrameSink, KeyMap, Player, PlayerCommand, TickOutcome};
