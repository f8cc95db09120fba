//! 播放器配置定义与解析

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::filters::{Filter, FlipAxis, MirrorKind};

/// 播放器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 播放参数
    pub playback: Playback,
    /// 按键绑定
    pub keys: Keys,
    /// 数字键滤镜槽位
    pub filters: Vec<FilterSlot>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playback: Playback::default(),
            keys: Keys::default(),
            filters: default_filter_slots(),
        }
    }
}

/// 播放参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Playback {
    /// 快进 / 快退步长（秒）
    pub seek_step: f64,
    /// 流中没有帧率信息时使用的帧率
    pub fallback_fps: f64,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            seek_step: 5.0,
            fallback_fps: 30.0,
        }
    }
}

/// 按键绑定，值为平台无关的按键代码（如 `"Space"`、`"ArrowLeft"`）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Keys {
    /// 暂停 / 继续
    pub toggle_pause: Vec<String>,
    /// 快退
    pub seek_backward: Vec<String>,
    /// 快进
    pub seek_forward: Vec<String>,
    /// 从头播放
    pub restart: Vec<String>,
    /// 退出
    pub quit: Vec<String>,
    /// 暂停时前进一帧
    pub step_forward: Vec<String>,
    /// 暂停时后退一帧
    pub step_backward: Vec<String>,
    /// 停用全部滤镜
    pub clear_filters: Vec<String>,
}

impl Default for Keys {
    fn default() -> Self {
        let keys = |codes: &[&str]| codes.iter().map(|&c| c.to_owned()).collect::<Vec<_>>();
        Self {
            toggle_pause: keys(&["Space"]),
            seek_backward: keys(&["ArrowLeft"]),
            seek_forward: keys(&["ArrowRight"]),
            restart: keys(&["Backspace"]),
            quit: keys(&["Escape"]),
            step_forward: keys(&["Period"]),
            step_backward: keys(&["Comma"]),
            clear_filters: keys(&["Digit0"]),
        }
    }
}

/// 滤镜槽位：按键切换某个预注册滤镜
#[derive(Debug, Clone, Deserialize)]
pub struct FilterSlot {
    /// 槽位编号
    pub slot: u8,
    /// 绑定的按键，缺省为 `Digit{slot}`
    #[serde(default)]
    pub key: Option<String>,
    /// 滤镜
    pub filter: FilterPreset,
}

impl FilterSlot {
    /// 实际绑定的按键代码
    #[must_use]
    pub fn key_code(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("Digit{}", self.slot))
    }
}

/// 配置文件中的滤镜写法
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterPreset {
    /// 翻转
    Flip {
        /// 方向
        axis: FlipAxis,
    },
    /// 分屏镜像
    Mirror {
        /// 方式
        mode: MirrorKind,
    },
    /// 灰度
    Grayscale {
        /// 强度，缺省为 1.0
        #[serde(default = "full_intensity")]
        intensity: f32,
    },
}

const fn full_intensity() -> f32 {
    1.0
}

impl FilterPreset {
    /// 转换为滤镜
    #[must_use]
    pub fn to_filter(self) -> Filter {
        match self {
            Self::Flip { axis } => Filter::Flip(axis),
            Self::Mirror { mode } => Filter::Mirror(mode),
            Self::Grayscale { intensity } => Filter::grayscale(intensity),
        }
    }
}

fn default_filter_slots() -> Vec<FilterSlot> {
    let presets = [
        FilterPreset::Flip {
            axis: FlipAxis::Vertical,
        },
        FilterPreset::Flip {
            axis: FlipAxis::Horizontal,
        },
        FilterPreset::Mirror {
            mode: MirrorKind::Horizontal,
        },
        FilterPreset::Mirror {
            mode: MirrorKind::Vertical,
        },
        FilterPreset::Mirror {
            mode: MirrorKind::Quad,
        },
        FilterPreset::Grayscale { intensity: 1.0 },
        FilterPreset::Grayscale { intensity: 0.5 },
    ];
    presets
        .into_iter()
        .zip(1u8..)
        .map(|(filter, slot)| FilterSlot {
            slot,
            key: None,
            filter,
        })
        .collect()
}

/// 从 TOML 字符串解析配置
///
/// # Errors
///
/// - TOML 解析失败
/// - 配置字段反序列化失败
pub fn parse_settings_str(s: &str) -> Result<Settings> {
    let cfg: Settings = toml::from_str(s)?;
    Ok(cfg)
}

/// 从指定路径加载配置（TOML）
///
/// # Errors
///
/// - 读取文件失败
/// - TOML 解析失败
/// - 配置字段反序列化失败
pub fn load_settings(path: &Path) -> Result<Settings> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置失败: {}", path.display()))?;
    parse_settings_str(&s).with_context(|| format!("解析配置失败: {}", path.display()))
}

/// 加载配置，文件不存在时使用内置默认值
///
/// # Errors
///
/// 文件存在但无法读取或解析
pub fn load_settings_or_default(path: &Path) -> Result<Settings> {
    if path.exists() {
        load_settings(path)
    } else {
        tracing::info!("配置文件 {} 不存在，使用默认配置", path.display());
        Ok(Settings::default())
    }
}
