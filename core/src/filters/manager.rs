//! 滤镜图管理器
//!
//! 维护滤镜注册表、启用链以及由启用链编译出的滤镜图。
//!
//! - 启用链为空时处于直通状态，[`FilterGraphManager::apply`] 原样交还输入帧；
//! - 启用链变化后同步重建滤镜图，重建失败则退回直通状态并返回错误；
//! - 滤镜图与启用链始终一致，不存在重建到一半的可见状态。

use std::collections::BTreeMap;

use tracing::{Span, debug, info_span, warn};

use super::Filter;
use super::backend::{CompiledGraph, FilterBackend, FilterError, GraphParams};
use crate::media::VideoFrame;

/// [`FilterGraphManager::apply`] 的结果
#[derive(Debug)]
pub enum FilterOutcome {
    /// 未经处理的输入帧本身
    Unchanged(VideoFrame),
    /// 滤镜图产出的新帧，时间戳已从输入帧复制
    Replaced(VideoFrame),
}

impl FilterOutcome {
    /// 取出帧
    #[must_use]
    pub fn into_frame(self) -> VideoFrame {
        match self {
            Self::Unchanged(frame) | Self::Replaced(frame) => frame,
        }
    }

    /// 借用帧
    #[must_use]
    pub const fn frame(&self) -> &VideoFrame {
        match self {
            Self::Unchanged(frame) | Self::Replaced(frame) => frame,
        }
    }

    /// 是否经过滤镜处理
    #[must_use]
    pub const fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced(_))
    }
}

/// 滤镜图管理器
pub struct FilterGraphManager<B: FilterBackend> {
    backend: B,
    params: GraphParams,
    registry: BTreeMap<String, Filter>,
    chain: Vec<String>,
    graph: Option<B::Graph>,
    span: Span,
}

impl<B: FilterBackend> FilterGraphManager<B> {
    /// 以源节点参数创建管理器，初始为直通状态
    pub fn new(backend: B, params: GraphParams) -> Self {
        Self::with_span(backend, params, info_span!("filters"))
    }

    /// 指定日志 span 创建管理器
    pub fn with_span(backend: B, params: GraphParams, span: Span) -> Self {
        Self {
            backend,
            params,
            registry: BTreeMap::new(),
            chain: Vec::new(),
            graph: None,
            span,
        }
    }

    /// 注册（或替换）滤镜，不影响启用链
    ///
    /// 被替换的滤镜正处于启用状态时重建滤镜图
    pub fn register_filter(&mut self, filter: Filter) {
        let id = filter.id();
        let replaced = self.registry.insert(id.clone(), filter);
        if replaced.is_some_and(|old| old != filter) && self.is_active(&id) {
            if let Err(e) = self.rebuild() {
                warn!(parent: &self.span, id = %id, "替换滤镜后重建失败: {e}");
            }
        }
    }

    /// 启用滤镜并追加到链尾
    ///
    /// # Errors
    ///
    /// - 未注册时返回 [`FilterError::NotFound`]，启用链不变
    /// - 重建失败时返回 [`FilterError::Graph`]，滤镜保留在链中，管理器处于直通状态
    pub fn activate_filter(&mut self, id: &str) -> Result<(), FilterError> {
        if self.is_active(id) {
            return Ok(());
        }
        if !self.registry.contains_key(id) {
            return Err(FilterError::NotFound(id.to_owned()));
        }
        self.chain.push(id.to_owned());
        debug!(parent: &self.span, id, chain = ?self.chain, "启用滤镜");
        self.rebuild()
    }

    /// 从链中移除滤镜（不存在时不改变链）并重建
    ///
    /// # Errors
    ///
    /// 重建失败
    pub fn deactivate_filter(&mut self, id: &str) -> Result<(), FilterError> {
        self.chain.retain(|active| active != id);
        debug!(parent: &self.span, id, chain = ?self.chain, "停用滤镜");
        self.rebuild()
    }

    /// 清空启用链并立即释放滤镜图
    pub fn deactivate_all(&mut self) {
        self.chain.clear();
        self.graph = None;
        debug!(parent: &self.span, "停用全部滤镜");
    }

    /// 滤镜是否在启用链中
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.chain.iter().any(|active| active == id)
    }

    /// 已注册的标识符（按字典序）
    #[must_use]
    pub fn list_registered(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// 启用链（按启用顺序）
    #[must_use]
    pub fn list_active(&self) -> Vec<String> {
        self.chain.clone()
    }

    /// 是否持有已编译的滤镜图
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    /// 当前滤镜图的完整描述
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.graph.as_ref().map(CompiledGraph::description)
    }

    /// 当前源节点参数
    #[must_use]
    pub const fn params(&self) -> GraphParams {
        self.params
    }

    /// 处理一帧
    ///
    /// 帧尺寸或格式与源节点不符时先按新参数重建。任何处理失败都只记录
    /// 警告并原样交还输入帧
    pub fn apply(&mut self, frame: VideoFrame) -> FilterOutcome {
        if self.chain.is_empty() {
            return FilterOutcome::Unchanged(frame);
        }
        if !self.params.accepts(&frame) {
            self.params = GraphParams {
                width: frame.width(),
                height: frame.height(),
                format: frame.format(),
            };
            debug!(parent: &self.span, params = ?self.params, "帧参数变化，重建滤镜图");
            if let Err(e) = self.rebuild() {
                warn!(parent: &self.span, "{e}");
            }
        }
        let Some(graph) = self.graph.as_mut() else {
            return FilterOutcome::Unchanged(frame);
        };
        match graph.run(&frame) {
            Ok(mut out) => {
                out.copy_timestamps_from(&frame);
                FilterOutcome::Replaced(out)
            }
            Err(e) => {
                warn!(parent: &self.span, "{e}");
                FilterOutcome::Unchanged(frame)
            }
        }
    }

    /// 按当前启用链完整重建滤镜图
    fn rebuild(&mut self) -> Result<(), FilterError> {
        self.graph = None;
        if self.chain.is_empty() {
            return Ok(());
        }
        let chain = self
            .chain
            .iter()
            .map(|id| {
                self.registry
                    .get(id)
                    .copied()
                    .ok_or_else(|| FilterError::NotFound(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match self.backend.compile(&self.params, &chain) {
            Ok(graph) => {
                debug!(parent: &self.span, description = graph.description(), "滤镜图已重建");
                self.graph = Some(graph);
                Ok(())
            }
            Err(e) => {
                warn!(parent: &self.span, "{e}，退回直通");
                Err(e)
            }
        }
    }
}
