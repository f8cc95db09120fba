//! `FFmpeg` 帧与 [`VideoFrame`] 之间的复制转换

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::frame;
use ffmpeg::software::scaling;

use crate::media::{PixelFormat, Plane, VideoFrame};

/// 映射到 `FFmpeg` 像素格式
#[must_use]
pub const fn to_av_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Rgb24 => Pixel::RGB24,
    }
}

/// 从 `FFmpeg` 像素格式映射，不支持的格式返回 `None`
#[must_use]
pub const fn from_av_pixel(pixel: Pixel) -> Option<PixelFormat> {
    match pixel {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        _ => None,
    }
}

/// 把 `FFmpeg` 视频帧复制为 [`VideoFrame`]（去除行填充）
///
/// 像素格式不受支持或缓冲区不完整时返回 `None`；时间戳不复制
#[must_use]
pub fn copy_from_av(src: &frame::Video) -> Option<VideoFrame> {
    let format = from_av_pixel(src.format())?;
    let (width, height) = (src.width(), src.height());
    let planes = (0..format.plane_count())
        .map(|i| {
            let (w, h) = format.plane_dimensions(i, width, height);
            Plane::from_strided(src.data(i), src.stride(i), w, h, format.bytes_per_pixel())
        })
        .collect::<Option<Vec<_>>>()?;
    VideoFrame::from_planes(format, width, height, planes)
}

/// 把 [`VideoFrame`] 复制为新分配的 `FFmpeg` 视频帧
#[must_use]
pub fn copy_to_av(src: &VideoFrame) -> frame::Video {
    let mut dst = frame::Video::new(to_av_pixel(src.format()), src.width(), src.height());
    for (i, plane) in src.planes().iter().enumerate() {
        let stride = dst.stride(i);
        let row_len = plane.width() as usize * plane.bytes_per_pixel();
        let data = dst.data_mut(i);
        for y in 0..plane.height() {
            let start = y as usize * stride;
            data[start..start + row_len].copy_from_slice(plane.row(y));
        }
    }
    dst
}

/// 用软件缩放器把 [`VideoFrame`] 转换为另一种像素格式，尺寸不变
///
/// 时间戳从输入帧复制
///
/// # Errors
///
/// 缩放器创建或转换失败，或输出缓冲区无法复制回来
pub fn convert_format(
    src: &VideoFrame,
    format: PixelFormat,
) -> Result<VideoFrame, ffmpeg::Error> {
    let input = copy_to_av(src);
    let mut scaler = scaling::Context::get(
        input.format(),
        src.width(),
        src.height(),
        to_av_pixel(format),
        src.width(),
        src.height(),
        scaling::Flags::BILINEAR,
    )?;
    let mut output = frame::Video::empty();
    scaler.run(&input, &mut output)?;
    let mut out = copy_from_av(&output).ok_or(ffmpeg::Error::InvalidData)?;
    out.copy_timestamps_from(src);
    Ok(out)
}
