//! 直接操作像素缓冲区的滤镜后端
//!
//! 不依赖 libavfilter，按 [`Filter`] 变体逐平面变换。几何变换把每个平面
//! 包装为 `image` 缓冲区后用 `imageops` 完成；灰度在 RGB 上按颜色矩阵混合，
//! 在 YUV 上等价为把色度向中性值收缩。

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb};

use super::backend::{CompiledGraph, FilterBackend, FilterError, GraphParams, combined_descriptor};
use super::{Filter, FlipAxis, Grayscale, MirrorKind};
use crate::media::{PixelFormat, Plane, VideoFrame};

/// 色度中性值
const NEUTRAL_CHROMA: f32 = 128.0;

/// 纯 Rust 像素后端
#[derive(Debug, Default, Clone, Copy)]
pub struct PixelBackend;

impl PixelBackend {
    /// 创建后端
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// [`PixelBackend`] 的编译产物：参数 + 按顺序执行的滤镜
#[derive(Debug, Clone)]
pub struct PixelGraph {
    params: GraphParams,
    chain: Vec<Filter>,
    description: String,
}

impl FilterBackend for PixelBackend {
    type Graph = PixelGraph;

    fn compile(
        &mut self,
        params: &GraphParams,
        chain: &[Filter],
    ) -> Result<Self::Graph, FilterError> {
        Ok(PixelGraph {
            params: *params,
            chain: chain.to_vec(),
            description: combined_descriptor(chain),
        })
    }
}

impl CompiledGraph for PixelGraph {
    fn run(&mut self, frame: &VideoFrame) -> Result<VideoFrame, FilterError> {
        if !self.params.accepts(frame) {
            return Err(FilterError::Apply(format!(
                "帧参数 {}x{} {} 与滤镜图 {}x{} {} 不符",
                frame.width(),
                frame.height(),
                frame.format().name(),
                self.params.width,
                self.params.height,
                self.params.format.name(),
            )));
        }
        let mut out = frame.clone();
        out.set_timestamps(None, None, 0.0);
        for filter in &self.chain {
            apply_filter(&mut out, filter)?;
        }
        Ok(out)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// 在帧上原地执行单个滤镜
///
/// # Errors
///
/// 平面无法包装为图像缓冲区时返回 [`FilterError::Apply`]
pub fn apply_filter(frame: &mut VideoFrame, filter: &Filter) -> Result<(), FilterError> {
    match *filter {
        Filter::Flip(axis) => map_planes(frame, PlaneOp::Flip(axis)),
        Filter::Mirror(kind) => map_planes(frame, PlaneOp::Mirror(kind)),
        Filter::Grayscale(g) => {
            desaturate(frame, g);
            Ok(())
        }
    }
}

/// 逐平面执行的几何变换
#[derive(Debug, Clone, Copy)]
enum PlaneOp {
    Flip(FlipAxis),
    Mirror(MirrorKind),
}

fn map_planes(frame: &mut VideoFrame, op: PlaneOp) -> Result<(), FilterError> {
    for i in 0..frame.format().plane_count() {
        let plane = transform_plane(frame.plane(i), op)
            .ok_or_else(|| FilterError::Apply(format!("平面 {i} 变换失败")))?;
        *frame.plane_mut(i) = plane;
    }
    Ok(())
}

/// 按每像素字节数选择 `image` 像素类型
fn transform_plane(plane: &Plane, op: PlaneOp) -> Option<Plane> {
    match plane.bytes_per_pixel() {
        1 => transform::<Luma<u8>>(plane, op),
        3 => transform::<Rgb<u8>>(plane, op),
        _ => None,
    }
}

type PlaneImage<P> = ImageBuffer<P, Vec<u8>>;

fn transform<P>(plane: &Plane, op: PlaneOp) -> Option<Plane>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = (plane.width(), plane.height());
    let src = PlaneImage::<P>::from_raw(w, h, plane.data().to_vec())?;
    let out = match op {
        PlaneOp::Flip(FlipAxis::Vertical) => imageops::flip_vertical(&src),
        PlaneOp::Flip(FlipAxis::Horizontal) => imageops::flip_horizontal(&src),
        PlaneOp::Mirror(kind) => mirror(src, kind),
    };
    Plane::from_packed(out.into_raw(), w, h, plane.bytes_per_pixel())
}

fn mirror<P>(mut img: PlaneImage<P>, kind: MirrorKind) -> PlaneImage<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    match kind {
        // 前半翻转后覆盖 [half, 2·half)，奇数尺寸的最后一行（列）保持原样
        MirrorKind::Horizontal => {
            let half = w / 2;
            if half > 0 {
                let mut left = imageops::crop_imm(&img, 0, 0, half, h).to_image();
                imageops::flip_horizontal_in_place(&mut left);
                imageops::replace(&mut img, &left, i64::from(half), 0);
            }
            img
        }
        MirrorKind::Vertical => {
            let half = h / 2;
            if half > 0 {
                let mut top = imageops::crop_imm(&img, 0, 0, w, half).to_image();
                imageops::flip_vertical_in_place(&mut top);
                imageops::replace(&mut img, &top, 0, i64::from(half));
            }
            img
        }
        MirrorKind::Quad => quad(&img),
    }
}

/// 四分屏中某一维的（偏移，尺寸）
const fn tile_span(index: u32, size: u32) -> (u32, u32) {
    let first = size / 2;
    if index == 0 {
        (0, first)
    } else {
        (first, size - first)
    }
}

/// 2×2 平铺整幅图的缩小副本：左上 hflip，右上原样，左下 vflip，右下 hflip + vflip
fn quad<P>(img: &PlaneImage<P>) -> PlaneImage<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    for row in 0..2 {
        for col in 0..2 {
            let (x, tw) = tile_span(col, w);
            let (y, th) = tile_span(row, h);
            if tw == 0 || th == 0 {
                continue;
            }
            let mut tile = imageops::resize(img, tw, th, FilterType::Nearest);
            if col == row {
                imageops::flip_horizontal_in_place(&mut tile);
            }
            if row == 1 {
                imageops::flip_vertical_in_place(&mut tile);
            }
            imageops::replace(&mut out, &tile, i64::from(x), i64::from(y));
        }
    }
    out
}

fn desaturate(frame: &mut VideoFrame, gray: Grayscale) {
    match frame.format() {
        PixelFormat::Rgb24 => {
            let m = gray.matrix();
            let plane = frame.plane_mut(0);
            for y in 0..plane.height() {
                for px in plane.row_mut(y).chunks_exact_mut(3) {
                    let src = [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])];
                    for (out, row) in px.iter_mut().zip(m.iter()) {
                        let v = row[0] * src[0] + row[1] * src[1] + row[2] * src[2];
                        *out = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
        PixelFormat::Yuv420p => {
            // 权重之和为 1，亮度不变，色度按 (1 − i) 收缩
            let keep = 1.0 - gray.intensity();
            for i in 1..3 {
                let plane = frame.plane_mut(i);
                for y in 0..plane.height() {
                    for c in plane.row_mut(y) {
                        let v = (f32::from(*c) - NEUTRAL_CHROMA) * keep + NEUTRAL_CHROMA;
                        *c = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
    }
}
