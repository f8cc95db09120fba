//! PTS 时钟
//!
//! 记录最近一次有效的显示时间（秒）以及视频流的时间基

use ffmpeg_next::Rational;

/// 本次显示时间取自哪一级来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsSource {
    /// 解码帧自带的 PTS
    Frame,
    /// 送入该帧的数据包的 DTS
    Packet,
    /// 已解码帧数 × 编解码器时间单位的估算值
    FrameCount,
}

/// 把有理数时间基转换为秒，分母为 0 时返回 0
#[must_use]
pub fn rational_seconds(r: Rational) -> f64 {
    if r.denominator() == 0 {
        0.0
    } else {
        f64::from(r.numerator()) / f64::from(r.denominator())
    }
}

/// PTS 时钟
#[derive(Debug, Clone, Copy)]
pub struct PtsClock {
    seconds: f64,
    time_base: Rational,
}

impl PtsClock {
    /// 以流时间基创建时钟，初始时间为 0
    #[must_use]
    pub const fn new(time_base: Rational) -> Self {
        Self {
            seconds: 0.0,
            time_base,
        }
    }

    /// 当前时间（秒）
    #[must_use]
    pub const fn seconds(&self) -> f64 {
        self.seconds
    }

    /// 流时间基
    #[must_use]
    pub const fn time_base(&self) -> Rational {
        self.time_base
    }

    /// 流刻度转秒
    #[must_use]
    pub fn to_seconds(&self, ticks: i64) -> f64 {
        ticks as f64 * rational_seconds(self.time_base)
    }

    /// 秒转流刻度（向零取整）
    #[must_use]
    pub fn to_ticks(&self, seconds: f64) -> i64 {
        let unit = rational_seconds(self.time_base);
        if unit > 0.0 {
            (seconds / unit) as i64
        } else {
            0
        }
    }

    /// 按三级回退计算显示时间，不修改时钟
    ///
    /// 依次尝试帧 PTS、数据包 DTS；两者都缺失时才使用
    /// `decoded_frames × codec_unit` 估算
    #[must_use]
    pub fn resolve(
        &self,
        frame_pts: Option<i64>,
        packet_dts: Option<i64>,
        decoded_frames: u64,
        codec_unit: f64,
    ) -> (f64, PtsSource) {
        if let Some(pts) = frame_pts {
            (self.to_seconds(pts), PtsSource::Frame)
        } else if let Some(dts) = packet_dts {
            (self.to_seconds(dts), PtsSource::Packet)
        } else {
            (decoded_frames as f64 * codec_unit, PtsSource::FrameCount)
        }
    }

    /// 按三级回退更新时钟，返回采用的来源
    pub fn observe(
        &mut self,
        frame_pts: Option<i64>,
        packet_dts: Option<i64>,
        decoded_frames: u64,
        codec_unit: f64,
    ) -> PtsSource {
        let (seconds, source) = self.resolve(frame_pts, packet_dts, decoded_frames, codec_unit);
        self.seconds = seconds;
        source
    }

    /// 跳转后乐观地把时钟设为目标时间，等待下一帧修正
    pub fn reset_to(&mut self, seconds: f64) {
        self.seconds = seconds;
    }
}
