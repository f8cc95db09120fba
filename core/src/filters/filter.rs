//! 滤镜描述
//!
//! 每个 [`Filter`] 是一个不可变的图像变换描述：稳定的标识符 +
//! 可交给文本滤镜图后端的描述片段。直接操作像素的后端按变体分派，
//! 不依赖描述文本。

use serde::Deserialize;

/// 灰度权重（R, G, B）
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// 强度不低于该值时视为完全去色
const FULL_DESATURATION: f32 = 0.999;

/// 翻转方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    /// 上下翻转
    Vertical,
    /// 左右翻转
    Horizontal,
}

/// 镜像方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    /// 左右分屏镜像：左半翻转后覆盖右半
    Horizontal,
    /// 上下分屏镜像：上半翻转后覆盖下半
    Vertical,
    /// 四分屏：四份缩小副本拼成 2×2
    Quad,
}

/// 灰度强度，构造时钳制到 `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grayscale {
    intensity: f32,
}

impl Grayscale {
    /// 创建灰度参数，`NaN` 视为 1.0
    #[must_use]
    pub fn new(intensity: f32) -> Self {
        let intensity = if intensity.is_nan() {
            1.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
        Self { intensity }
    }

    /// 强度
    #[must_use]
    pub const fn intensity(self) -> f32 {
        self.intensity
    }

    /// 是否完全去色
    #[must_use]
    pub fn is_full(self) -> bool {
        self.intensity >= FULL_DESATURATION
    }

    /// 输出通道混合矩阵，`m[out][src]`
    ///
    /// 对角线为 `w·i + (1 − i)`，其余为 `w·i`
    #[must_use]
    pub fn matrix(self) -> [[f32; 3]; 3] {
        let i = self.intensity;
        let keep = 1.0 - i;
        let mut m = [[0.0; 3]; 3];
        for (out, row) in m.iter_mut().enumerate() {
            for (src, coeff) in row.iter_mut().enumerate() {
                *coeff = LUMA_WEIGHTS[src] * i;
                if out == src {
                    *coeff += keep;
                }
            }
        }
        m
    }
}

/// 滤镜
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// 翻转
    Flip(FlipAxis),
    /// 分屏镜像
    Mirror(MirrorKind),
    /// 灰度
    Grayscale(Grayscale),
}

impl Filter {
    /// 灰度滤镜的便捷构造
    #[must_use]
    pub fn grayscale(intensity: f32) -> Self {
        Self::Grayscale(Grayscale::new(intensity))
    }

    /// 注册表中的唯一标识符
    ///
    /// 灰度标识符包含强度，不同强度是不同的滤镜
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::Flip(FlipAxis::Vertical) => "vflip".to_owned(),
            Self::Flip(FlipAxis::Horizontal) => "hflip".to_owned(),
            Self::Mirror(MirrorKind::Horizontal) => "hmirror".to_owned(),
            Self::Mirror(MirrorKind::Vertical) => "vmirror".to_owned(),
            Self::Mirror(MirrorKind::Quad) => "quadmirror".to_owned(),
            Self::Grayscale(g) => format!("gray{:.6}", g.intensity()),
        }
    }

    /// libavfilter 描述片段
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Flip(FlipAxis::Vertical) => "vflip".to_owned(),
            Self::Flip(FlipAxis::Horizontal) => "hflip".to_owned(),
            Self::Mirror(MirrorKind::Horizontal) => {
                "split[main][tmp];[tmp]crop=iw/2:ih:0:0,hflip[flip];[main][flip]overlay=W/2:0"
                    .to_owned()
            }
            Self::Mirror(MirrorKind::Vertical) => {
                "split[main][tmp];[tmp]crop=iw:ih/2:0:0,vflip[flip];[main][flip]overlay=0:H/2"
                    .to_owned()
            }
            Self::Mirror(MirrorKind::Quad) => concat!(
                "split=4[a][b][c][d];",
                "[a]scale=iw/2:ih/2,hflip[ah];",
                "[b]scale=iw/2:ih/2,vflip[bv];",
                "[c]scale=iw/2:ih/2,hflip,vflip[chv];",
                "[d]scale=iw/2:ih/2[dd];",
                "[ah][bv]vstack=inputs=2[left];",
                "[dd][chv]vstack=inputs=2[right];",
                "[left][right]hstack=inputs=2"
            )
            .to_owned(),
            Self::Grayscale(g) if g.is_full() => "format=gray".to_owned(),
            Self::Grayscale(g) => {
                let m = g.matrix();
                format!(
                    "colorchannelmixer=rr={:.3}:rg={:.3}:rb={:.3}:gr={:.3}:gg={:.3}:gb={:.3}:br={:.3}:bg={:.3}:bb={:.3}",
                    m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
                )
            }
        }
    }

    /// 灰度滤镜的颜色矩阵；其它滤镜返回 `None`
    #[must_use]
    pub fn color_matrix(&self) -> Option<[[f32; 3]; 3]> {
        match self {
            Self::Grayscale(g) => Some(g.matrix()),
            Self::Flip(_) | Self::Mirror(_) => None,
        }
    }
}
