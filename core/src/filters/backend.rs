//! 滤镜图后端抽象
//!
//! 管理器只通过 [`FilterBackend`] 编译滤镜图、通过 [`CompiledGraph`] 处理帧，
//! 不关心后端是文本滤镜图（libavfilter）还是直接操作像素缓冲区。

use std::fmt;

use thiserror::Error;

use super::Filter;
use crate::media::{PixelFormat, VideoFrame};

/// 源节点使用的固定时间基 `(num, den)`
pub const GRAPH_TIME_BASE: (i32, i32) = (1, 1000);

/// 拼接描述片段的分隔符
pub const DESCRIPTOR_SEPARATOR: &str = ",";

/// 滤镜图构建阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStage {
    /// 初始化后端或分配滤镜图
    Allocate,
    /// 创建源节点
    Source,
    /// 创建输出节点
    Sink,
    /// 解析描述
    Parse,
    /// 校验与配置
    Configure,
}

impl fmt::Display for GraphStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allocate => "allocate",
            Self::Source => "source",
            Self::Sink => "sink",
            Self::Parse => "parse",
            Self::Configure => "configure",
        };
        f.write_str(name)
    }
}

/// 滤镜错误
#[derive(Debug, Error)]
pub enum FilterError {
    /// 标识符未注册
    #[error("未注册的滤镜: {0}")]
    NotFound(String),
    /// 构建滤镜图失败，管理器已退回直通状态
    #[error("滤镜图构建失败 ({stage}): {message}")]
    Graph {
        /// 失败阶段
        stage: GraphStage,
        /// 后端错误信息
        message: String,
    },
    /// 处理单帧失败
    #[error("滤镜处理失败: {0}")]
    Apply(String),
}

impl FilterError {
    /// 构造 [`FilterError::Graph`]
    pub fn graph(stage: GraphStage, message: impl fmt::Display) -> Self {
        Self::Graph {
            stage,
            message: message.to_string(),
        }
    }
}

/// 源节点参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphParams {
    /// 输入宽度
    pub width: u32,
    /// 输入高度
    pub height: u32,
    /// 输入与输出的像素格式
    pub format: PixelFormat,
}

impl GraphParams {
    /// 帧是否与源节点参数一致
    #[must_use]
    pub fn accepts(&self, frame: &VideoFrame) -> bool {
        frame.width() == self.width && frame.height() == self.height && frame.format() == self.format
    }
}

/// 按链顺序拼接描述片段
#[must_use]
pub fn combined_descriptor(chain: &[Filter]) -> String {
    chain
        .iter()
        .map(Filter::descriptor)
        .collect::<Vec<_>>()
        .join(DESCRIPTOR_SEPARATOR)
}

/// 已编译的滤镜图：单输入单输出
pub trait CompiledGraph {
    /// 推入一帧并取出一帧
    ///
    /// 输出帧不携带时间戳，时间由调用方负责
    ///
    /// # Errors
    ///
    /// 后端处理失败
    fn run(&mut self, frame: &VideoFrame) -> Result<VideoFrame, FilterError>;

    /// 编译时使用的完整描述
    fn description(&self) -> &str;
}

/// 滤镜图后端
pub trait FilterBackend {
    /// 编译产物
    type Graph: CompiledGraph;

    /// 按链顺序编译滤镜图
    ///
    /// # Errors
    ///
    /// 任一构建阶段失败时返回 [`FilterError::Graph`]，不产生部分构建的图
    fn compile(&mut self, params: &GraphParams, chain: &[Filter])
    -> Result<Self::Graph, FilterError>;
}
