//! 滤镜与滤镜图管理
//!
//! [`Filter`] 描述单个图像变换，[`FilterGraphManager`] 管理启用链并通过
//! [`FilterBackend`] 编译、执行滤镜图。

mod backend;
mod filter;
mod lavfi;
mod manager;
mod pixel;

pub use backend::{
    CompiledGraph, DESCRIPTOR_SEPARATOR, FilterBackend, FilterError, GRAPH_TIME_BASE, GraphParams,
    GraphStage, combined_descriptor,
};
pub use filter::{Filter, FlipAxis, Grayscale, LUMA_WEIGHTS, MirrorKind};
pub use lavfi::{LavfiBackend, LavfiGraph};
pub use manager::{FilterGraphManager, FilterOutcome};
pub use pixel::{PixelBackend, PixelGraph, apply_filter};
