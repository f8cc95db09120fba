//! 视频帧数据模型
//!
//! 解码引擎、滤镜图和显示端之间传递的都是 [`VideoFrame`]。
//! 帧始终只有一个所有者，在各阶段之间按值移动。

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 平面 YUV 4:2:0（一个全分辨率亮度平面 + 两个半分辨率色度平面）
    Yuv420p,
    /// 打包 RGB，每像素 3 字节
    Rgb24,
}

impl PixelFormat {
    /// 平面数量
    #[must_use]
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p => 3,
            Self::Rgb24 => 1,
        }
    }

    /// 指定平面的每像素字节数
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Yuv420p => 1,
            Self::Rgb24 => 3,
        }
    }

    /// libavfilter 使用的像素格式名
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Rgb24 => "rgb24",
        }
    }

    /// 计算第 `plane` 个平面的尺寸（像素）
    ///
    /// 色度平面向上取整，与 `FFmpeg` 的 `AV_CEIL_RSHIFT` 一致
    #[must_use]
    pub const fn plane_dimensions(self, plane: usize, width: u32, height: u32) -> (u32, u32) {
        match (self, plane) {
            (Self::Yuv420p, 1 | 2) => (width.div_ceil(2), height.div_ceil(2)),
            _ => (width, height),
        }
    }
}

/// 单个图像平面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
}

impl Plane {
    /// 创建以 `fill` 填充的平面，行跨度等于有效行宽
    #[must_use]
    pub fn filled(width: u32, height: u32, bytes_per_pixel: usize, fill: u8) -> Self {
        let stride = width as usize * bytes_per_pixel;
        Self {
            data: vec![fill; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// 从带行跨度的外部缓冲区复制，去掉每行末尾的填充字节
    ///
    /// 缓冲区不足时返回 `None`
    #[must_use]
    pub fn from_strided(
        src: &[u8],
        src_stride: usize,
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
    ) -> Option<Self> {
        let row_len = width as usize * bytes_per_pixel;
        if height > 0 && src_stride < row_len {
            return None;
        }
        let mut data = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as usize {
            let start = y * src_stride;
            data.extend_from_slice(src.get(start..start + row_len)?);
        }
        Some(Self {
            data,
            stride: row_len,
            width,
            height,
            bytes_per_pixel,
        })
    }

    /// 接管紧密排列的像素数据（行跨度等于有效行宽）
    ///
    /// 长度不符时返回 `None`
    #[must_use]
    pub fn from_packed(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
    ) -> Option<Self> {
        let stride = width as usize * bytes_per_pixel;
        (data.len() == stride * height as usize).then_some(Self {
            data,
            stride,
            width,
            height,
            bytes_per_pixel,
        })
    }

    /// 原始字节
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 行跨度（字节）
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// 平面宽度（像素）
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// 平面高度（像素）
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// 每像素字节数
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// 第 `y` 行的有效像素字节
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    /// 第 `y` 行的有效像素字节（可写）
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..start + len]
    }

    /// 像素 `(x, y)` 的字节
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = y as usize * self.stride + x as usize * self.bytes_per_pixel;
        &self.data[start..start + self.bytes_per_pixel]
    }

    /// 像素 `(x, y)` 的字节（可写）
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride + x as usize * self.bytes_per_pixel;
        &mut self.data[start..start + self.bytes_per_pixel]
    }

    /// 用 `value` 填满整个平面
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

/// 交给渲染端的 YUV 平面视图
///
/// 只在借用期间有效，渲染端必须同步消费或复制
#[derive(Debug, Clone, Copy)]
pub struct YuvView<'a> {
    /// 亮度平面
    pub y: &'a [u8],
    /// 亮度行跨度
    pub y_stride: usize,
    /// 第一个色度平面（U / Cb）
    pub u: &'a [u8],
    /// U 平面行跨度
    pub u_stride: usize,
    /// 第二个色度平面（V / Cr）
    pub v: &'a [u8],
    /// V 平面行跨度
    pub v_stride: usize,
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// 色度平面宽度
    pub chroma_width: u32,
    /// 色度平面高度
    pub chroma_height: u32,
}

/// 一帧解码（或滤镜处理）后的图像
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    format: PixelFormat,
    width: u32,
    height: u32,
    planes: Vec<Plane>,
    pts: Option<i64>,
    dts: Option<i64>,
    time: f64,
}

impl VideoFrame {
    /// 创建黑色帧（YUV 色度置中性值 128）
    #[must_use]
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let planes = (0..format.plane_count())
            .map(|i| {
                let (w, h) = format.plane_dimensions(i, width, height);
                let fill = if format == PixelFormat::Yuv420p && i > 0 {
                    128
                } else {
                    0
                };
                Plane::filled(w, h, format.bytes_per_pixel(), fill)
            })
            .collect();
        Self {
            format,
            width,
            height,
            planes,
            pts: None,
            dts: None,
            time: 0.0,
        }
    }

    /// 由现成平面组装帧
    ///
    /// 平面数量或尺寸与格式不符时返回 `None`
    #[must_use]
    pub fn from_planes(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<Plane>,
    ) -> Option<Self> {
        if planes.len() != format.plane_count() {
            return None;
        }
        let consistent = planes.iter().enumerate().all(|(i, p)| {
            (p.width(), p.height()) == format.plane_dimensions(i, width, height)
                && p.bytes_per_pixel() == format.bytes_per_pixel()
        });
        consistent.then_some(Self {
            format,
            width,
            height,
            planes,
            pts: None,
            dts: None,
            time: 0.0,
        })
    }

    /// 像素格式
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// 宽度
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// 高度
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// 全部平面
    #[must_use]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// 第 `index` 个平面
    #[must_use]
    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    /// 第 `index` 个平面（可写）
    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// 显示时间戳（流时间基刻度）
    #[must_use]
    pub const fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// 解码时间戳（流时间基刻度）
    #[must_use]
    pub const fn dts(&self) -> Option<i64> {
        self.dts
    }

    /// 显示时间（秒）
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// 设置时间戳
    pub fn set_timestamps(&mut self, pts: Option<i64>, dts: Option<i64>, time: f64) {
        self.pts = pts;
        self.dts = dts;
        self.time = time;
    }

    /// 从另一帧复制时间戳
    pub fn copy_timestamps_from(&mut self, other: &Self) {
        self.set_timestamps(other.pts, other.dts, other.time);
    }

    /// YUV 4:2:0 平面视图；RGB 帧返回 `None`
    #[must_use]
    pub fn yuv_view(&self) -> Option<YuvView<'_>> {
        let [y, u, v] = self.planes.as_slice() else {
            return None;
        };
        Some(YuvView {
            y: y.data(),
            y_stride: y.stride(),
            u: u.data(),
            u_stride: u.stride(),
            v: v.data(),
            v_stride: v.stride(),
            width: self.width,
            height: self.height,
            chroma_width: u.width(),
            chroma_height: u.height(),
        })
    }

    /// 用 `FFmpeg` 软件缩放器转换为指定像素格式，尺寸与时间戳不变
    ///
    /// 格式相同时直接克隆
    ///
    /// # Errors
    ///
    /// 缩放器创建或转换失败
    pub fn to_format(&self, format: PixelFormat) -> Result<Self, ffmpeg_next::Error> {
        if self.format == format {
            return Ok(self.clone());
        }
        crate::media::ffmpeg::convert::convert_format(self, format)
    }
}
