//! libavfilter 滤镜图后端
//!
//! `buffer`（源）→ 解析后的描述 → `buffersink`（输出）。

use std::fmt::Write as _;

use ffmpeg_next as ffmpeg;
use ffmpeg::filter;
use ffmpeg::frame;

use super::Filter;
use super::backend::{
    CompiledGraph, DESCRIPTOR_SEPARATOR, FilterBackend, FilterError, GRAPH_TIME_BASE, GraphParams,
    GraphStage,
};
use crate::media::VideoFrame;
use crate::media::ffmpeg::convert;

const SOURCE_NAME: &str = "in";
const SINK_NAME: &str = "out";

/// libavfilter 后端
#[derive(Debug)]
pub struct LavfiBackend {
    _private: (),
}

impl LavfiBackend {
    /// 初始化 `FFmpeg` 并创建后端
    ///
    /// # Errors
    ///
    /// `FFmpeg` 初始化失败
    pub fn new() -> Result<Self, FilterError> {
        ffmpeg::init().map_err(|e| FilterError::graph(GraphStage::Allocate, e))?;
        Ok(Self { _private: () })
    }
}

/// 已配置的 libavfilter 滤镜图
pub struct LavfiGraph {
    graph: filter::Graph,
    description: String,
    next_pts: i64,
}

impl std::fmt::Debug for LavfiGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LavfiGraph")
            .field("description", &self.description)
            .field("next_pts", &self.next_pts)
            .finish_non_exhaustive()
    }
}

/// 源节点参数字符串
#[must_use]
pub fn source_args(params: &GraphParams) -> String {
    format!(
        "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect=1/1",
        params.width,
        params.height,
        params.format.name(),
        GRAPH_TIME_BASE.0,
        GRAPH_TIME_BASE.1,
    )
}

/// 给描述片段中的连接标签加上链位置前缀
///
/// 同一滤镜出现在链中多个位置（或两种镜像同时启用）时标签不会重名
#[must_use]
pub fn scope_labels(fragment: &str, index: usize) -> String {
    let mut out = String::with_capacity(fragment.len() + 8);
    let mut rest = fragment;
    while let Some(open) = rest.find('[') {
        let (head, tail) = rest.split_at(open);
        out.push_str(head);
        let Some(close) = tail.find(']') else {
            out.push_str(tail);
            return out;
        };
        let _ = write!(out, "[f{index}_{}]", &tail[1..close]);
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

/// 带作用域标签的完整描述，空链返回 `null`
#[must_use]
pub fn graph_descriptor(chain: &[Filter]) -> String {
    let joined = chain
        .iter()
        .enumerate()
        .map(|(i, f)| scope_labels(&f.descriptor(), i))
        .collect::<Vec<_>>()
        .join(DESCRIPTOR_SEPARATOR);
    if joined.is_empty() {
        "null".to_owned()
    } else {
        joined
    }
}

impl FilterBackend for LavfiBackend {
    type Graph = LavfiGraph;

    fn compile(
        &mut self,
        params: &GraphParams,
        chain: &[Filter],
    ) -> Result<Self::Graph, FilterError> {
        let description = graph_descriptor(chain);
        let mut graph = filter::Graph::new();

        let buffer = filter::find("buffer")
            .ok_or_else(|| FilterError::graph(GraphStage::Source, "缺少 buffer 滤镜"))?;
        graph
            .add(&buffer, SOURCE_NAME, &source_args(params))
            .map_err(|e| FilterError::graph(GraphStage::Source, e))?;

        let sink = filter::find("buffersink")
            .ok_or_else(|| FilterError::graph(GraphStage::Sink, "缺少 buffersink 滤镜"))?;
        graph
            .add(&sink, SINK_NAME, "")
            .map_err(|e| FilterError::graph(GraphStage::Sink, e))?;
        let mut out = graph
            .get(SINK_NAME)
            .ok_or_else(|| FilterError::graph(GraphStage::Sink, "输出节点不存在"))?;
        out.set_pixel_format(convert::to_av_pixel(params.format));

        graph
            .output(SOURCE_NAME, 0)
            .and_then(|parser| parser.input(SINK_NAME, 0))
            .and_then(|parser| parser.parse(&description))
            .map_err(|e| FilterError::graph(GraphStage::Parse, format!("{e}: {description}")))?;
        graph
            .validate()
            .map_err(|e| FilterError::graph(GraphStage::Configure, e))?;

        Ok(LavfiGraph {
            graph,
            description,
            next_pts: 0,
        })
    }
}

impl CompiledGraph for LavfiGraph {
    fn run(&mut self, frame: &VideoFrame) -> Result<VideoFrame, FilterError> {
        let mut input = convert::copy_to_av(frame);
        input.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.graph
            .get(SOURCE_NAME)
            .ok_or_else(|| FilterError::Apply("源节点不存在".to_owned()))?
            .source()
            .add(&input)
            .map_err(|e| FilterError::Apply(e.to_string()))?;

        let mut output = frame::Video::empty();
        self.graph
            .get(SINK_NAME)
            .ok_or_else(|| FilterError::Apply("输出节点不存在".to_owned()))?
            .sink()
            .frame(&mut output)
            .map_err(|e| FilterError::Apply(e.to_string()))?;

        convert::copy_from_av(&output).ok_or_else(|| {
            FilterError::Apply(format!("不支持的输出像素格式 {:?}", output.format()))
        })
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FlipAxis, MirrorKind};
    use crate::media::PixelFormat;

    #[test]
    fn test_labels_are_scoped_per_position() {
        assert_eq!(
            scope_labels("split[main][tmp];[tmp]hflip[flip];[main][flip]overlay", 2),
            "split[f2_main][f2_tmp];[f2_tmp]hflip[f2_flip];[f2_main][f2_flip]overlay"
        );
        assert_eq!(scope_labels("vflip", 0), "vflip");
    }

    #[test]
    fn test_descriptor_keeps_chain_order() {
        let chain = [
            Filter::Flip(FlipAxis::Vertical),
            Filter::Mirror(MirrorKind::Horizontal),
        ];
        let d = graph_descriptor(&chain);
        assert!(d.starts_with("vflip,split[f1_main][f1_tmp];"));
        assert_eq!(graph_descriptor(&[]), "null");
    }

    #[test]
    fn test_source_args() {
        let params = GraphParams {
            width: 320,
            height: 240,
            format: PixelFormat::Yuv420p,
        };
        assert_eq!(
            source_args(&params),
            "video_size=320x240:pix_fmt=yuv420p:time_base=1/1000:pixel_aspect=1/1"
        );
    }

    #[test]
    fn test_vflip_graph_runs() {
        let mut backend = LavfiBackend::new().unwrap();
        let params = GraphParams {
            width: 16,
            height: 16,
            format: PixelFormat::Yuv420p,
        };
        let mut graph = backend
            .compile(&params, &[Filter::Flip(FlipAxis::Vertical)])
            .unwrap();
        let mut frame = VideoFrame::new(PixelFormat::Yuv420p, 16, 16);
        frame.plane_mut(0).row_mut(0).fill(200);
        let out = graph.run(&frame).unwrap();
        assert_eq!((out.width(), out.height()), (16, 16));
        assert_eq!(out.plane(0).pixel(3, 15), &[200]);
        assert_eq!(out.plane(0).pixel(3, 0), &[0]);
    }
}
