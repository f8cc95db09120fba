//! `FFmpeg` 视频解码引擎

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{Packet, Rational, Rescale, codec, decoder, format, frame, media};
use tracing::{Span, debug, info, info_span, trace, warn};

use super::clock::{PtsClock, PtsSource, rational_seconds};
use super::convert::copy_from_av;
use crate::media::{OpenError, PixelFormat, SeekError, VideoDecoder, VideoFrame};

/// 连续读包失败多少次后视为流结束
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 32;

/// 排空阶段连续取帧失败多少次后放弃剩余缓存帧
const MAX_CONSECUTIVE_DRAIN_ERRORS: u32 = 32;

/// 数据流读取状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// 正常读包解码
    Reading,
    /// 容器已读完，正在取出解码器缓存的帧
    Draining,
    /// 没有更多帧，直到下一次跳转
    Exhausted,
}

/// 一次 `receive_frame` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Received {
    /// 取到一帧
    Frame,
    /// 需要更多数据包
    NeedInput,
    /// 解码出错，本帧丢弃
    Failed,
    /// 解码器已无更多输出
    Finished,
}

/// 取帧之后的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// 交出解码帧
    Deliver,
    /// 读下一个数据包
    Feed,
    /// 继续从解码器取帧
    Retry,
    /// 标记流结束
    Finish,
}

/// 由读取状态、取帧结果和排空阶段的连续失败次数决定下一步
///
/// 排空阶段的解码错误只丢弃当前帧，解码器里剩下的帧继续取出
const fn next_step(state: StreamState, received: Received, drain_errors: u32) -> Step {
    match (received, state) {
        (Received::Frame, _) => Step::Deliver,
        (Received::NeedInput | Received::Failed, StreamState::Reading) => Step::Feed,
        (Received::Failed, StreamState::Draining)
            if drain_errors < MAX_CONSECUTIVE_DRAIN_ERRORS =>
        {
            Step::Retry
        }
        _ => Step::Finish,
    }
}

/// 非 YUV420P 输出时使用的像素格式转换器
struct Scaler {
    context: scaling::Context,
    source: (Pixel, u32, u32),
}

/// `FFmpeg` 视频解码引擎
///
/// 打开容器后选中第一条视频流，解码器与容器由同一个值持有，
/// 生命周期一致
pub struct DecodeEngine {
    input: format::context::Input,
    decoder: decoder::Video,
    stream_index: usize,
    scaler: Option<Scaler>,
    clock: PtsClock,
    codec_unit: f64,
    frame_interval: Option<f64>,
    frames_decoded: u64,
    last_packet_dts: Option<i64>,
    read_errors: u32,
    drain_errors: u32,
    state: StreamState,
    width: u32,
    height: u32,
    duration: f64,
    span: Span,
}

impl DecodeEngine {
    /// 打开媒体文件并初始化解码器
    ///
    /// # Errors
    ///
    /// - 文件不存在
    /// - 容器无法解析
    /// - 没有视频流
    /// - 找不到解码器或解码器初始化失败
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let span = info_span!("decode", path = %path.display());
        Self::open_with_span(path, span)
    }

    /// 打开媒体文件，日志记录在调用方提供的 `span` 下
    ///
    /// # Errors
    ///
    /// 与 [`DecodeEngine::open`] 相同
    pub fn open_with_span(path: impl AsRef<Path>, span: Span) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let guard = span.enter();

        if !path.is_file() {
            return Err(OpenError::NoSuchFile(path.to_path_buf()));
        }
        ffmpeg::init().map_err(OpenError::BackendInit)?;

        let input = format::input(&path).map_err(|source| OpenError::InvalidContainer {
            path: path.to_path_buf(),
            source,
        })?;

        let (stream_index, time_base, avg_frame_rate, parameters) = {
            let stream = input
                .streams()
                .find(|s| s.parameters().medium() == media::Type::Video)
                .ok_or(OpenError::NoVideoStream)?;
            (
                stream.index(),
                stream.time_base(),
                stream.avg_frame_rate(),
                stream.parameters(),
            )
        };

        let codec_id = parameters.id();
        if decoder::find(codec_id).is_none() {
            return Err(OpenError::UnsupportedCodec(codec_id));
        }
        let decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|ctx| ctx.decoder().video())
            .map_err(OpenError::DecoderInitFailed)?;

        let codec_unit = codec_time_unit(rational_seconds(decoder.time_base()), avg_frame_rate);
        let frame_interval = frame_interval(avg_frame_rate, codec_unit);
        let duration = container_duration(input.duration());
        let (width, height) = (decoder.width(), decoder.height());

        info!(
            stream = stream_index,
            codec = ?codec_id,
            width,
            height,
            duration,
            time_base = %time_base,
            "视频流已打开"
        );
        drop(guard);

        Ok(Self {
            input,
            decoder,
            stream_index,
            scaler: None,
            clock: PtsClock::new(time_base),
            codec_unit,
            frame_interval,
            frames_decoded: 0,
            last_packet_dts: None,
            read_errors: 0,
            drain_errors: 0,
            state: StreamState::Reading,
            width,
            height,
            duration,
            span,
        })
    }

    /// 选中的视频流索引
    #[must_use]
    pub const fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// 视频流时间基
    #[must_use]
    pub const fn time_base(&self) -> Rational {
        self.clock.time_base()
    }

    /// 是否已到达流末尾
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == StreamState::Exhausted
    }

    /// 已成功解码的帧数（跳转后按目标时间重新估算）
    #[must_use]
    pub const fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// 从解码器取出一帧
    fn receive(&mut self, decoded: &mut frame::Video) -> Received {
        match self.decoder.receive_frame(decoded) {
            Ok(()) => Received::Frame,
            Err(ffmpeg::Error::Eof) => Received::Finished,
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
                Received::NeedInput
            }
            Err(e) => {
                warn!(error = %e, state = ?self.state, "解码失败，跳过");
                Received::Failed
            }
        }
    }

    /// 读取下一个属于视频流的数据包并送入解码器
    fn feed(&mut self) {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                self.read_errors = 0;
                if packet.stream() != self.stream_index {
                    return;
                }
                self.last_packet_dts = packet.dts();
                if let Err(e) = self.decoder.send_packet(&packet) {
                    warn!(error = %e, dts = ?packet.dts(), "数据包解码失败，跳过");
                }
            }
            Err(ffmpeg::Error::Eof) => {
                debug!("容器读取完毕，取出解码器缓存帧");
                self.enter_draining();
            }
            Err(e) => {
                self.read_errors += 1;
                warn!(error = %e, attempt = self.read_errors, "读取数据包失败");
                if self.read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    self.enter_draining();
                }
            }
        }
    }

    fn enter_draining(&mut self) {
        self.last_packet_dts = None;
        match self.decoder.send_eof() {
            Ok(()) => self.state = StreamState::Draining,
            Err(e) => {
                warn!(error = %e, "无法通知解码器流结束");
                self.state = StreamState::Exhausted;
            }
        }
    }

    /// 更新 PTS 时钟并把解码帧转换为 YUV420P
    fn finish_frame(&mut self, decoded: &frame::Video) -> Option<VideoFrame> {
        let packet_dts = match self.state {
            StreamState::Reading => self.last_packet_dts,
            StreamState::Draining | StreamState::Exhausted => None,
        };
        self.frames_decoded += 1;
        let source = self.clock.observe(
            decoded.pts(),
            packet_dts,
            self.frames_decoded,
            self.codec_unit,
        );
        if source != PtsSource::Frame {
            trace!(?source, "帧缺少 PTS，使用回退时间");
        }
        debug!(last_valid_pts = self.clock.seconds());

        let converted = if decoded.format() == Pixel::YUV420P {
            copy_from_av(decoded)
        } else {
            self.scale(decoded)
        };
        let mut frame = converted?;
        frame.set_timestamps(decoded.pts(), packet_dts, self.clock.seconds());
        Some(frame)
    }

    /// 使用软件缩放器把任意像素格式转换为 YUV420P
    fn scale(&mut self, decoded: &frame::Video) -> Option<VideoFrame> {
        let source = (decoded.format(), decoded.width(), decoded.height());
        if self.scaler.as_ref().is_none_or(|s| s.source != source) {
            match scaling::Context::get(
                source.0,
                source.1,
                source.2,
                Pixel::YUV420P,
                source.1,
                source.2,
                scaling::Flags::BILINEAR,
            ) {
                Ok(context) => self.scaler = Some(Scaler { context, source }),
                Err(e) => {
                    warn!(error = %e, format = ?source.0, "无法创建缩放器");
                    return None;
                }
            }
        }
        let scaler = self.scaler.as_mut()?;
        let mut yuv = frame::Video::empty();
        if let Err(e) = scaler.context.run(decoded, &mut yuv) {
            warn!(error = %e, "像素格式转换失败");
            return None;
        }
        copy_from_av(&yuv)
    }
}

impl VideoDecoder for DecodeEngine {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        let span = self.span.clone();
        let _guard = span.enter();

        let mut decoded = frame::Video::empty();
        loop {
            if self.state == StreamState::Exhausted {
                return None;
            }
            let received = self.receive(&mut decoded);
            if received == Received::Failed && self.state == StreamState::Draining {
                self.drain_errors += 1;
            }
            match next_step(self.state, received, self.drain_errors) {
                Step::Deliver => {
                    self.drain_errors = 0;
                    if let Some(frame) = self.finish_frame(&decoded) {
                        return Some(frame);
                    }
                    warn!("帧转换失败，跳过");
                }
                Step::Feed => self.feed(),
                Step::Retry => {}
                Step::Finish => {
                    debug!(frames = self.frames_decoded, "视频流已结束");
                    self.state = StreamState::Exhausted;
                }
            }
        }
    }

    fn current_pts(&self) -> f64 {
        self.clock.seconds()
    }

    fn seek(&mut self, target_seconds: f64) -> Result<(), SeekError> {
        let _guard = self.span.enter();
        if !target_seconds.is_finite() {
            return Err(SeekError::InvalidTarget(target_seconds));
        }
        let upper = if self.duration > 0.0 {
            self.duration
        } else {
            f64::INFINITY
        };
        let target = target_seconds.clamp(0.0, upper);

        // 流时间基刻度 → AV_TIME_BASE，只允许落在目标及之前的关键帧
        let ticks = self.clock.to_ticks(target);
        let timestamp = ticks.rescale(self.clock.time_base(), ffmpeg::rescale::TIME_BASE);
        if let Err(source) = self.input.seek(timestamp, ..timestamp) {
            warn!(target, error = %source, "跳转失败");
            return Err(SeekError::Backend { target, source });
        }

        self.decoder.flush();
        self.state = StreamState::Reading;
        self.read_errors = 0;
        self.drain_errors = 0;
        self.last_packet_dts = None;
        if self.codec_unit > 0.0 {
            self.frames_decoded = (target / self.codec_unit) as u64;
        }
        self.clock.reset_to(target);
        debug!(requested = target_seconds, target, ticks, "跳转完成");
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Yuv420p
    }

    fn frame_interval(&self) -> Option<f64> {
        self.frame_interval
    }
}

/// 编解码器时间单位：优先解码器时间基，其次平均帧率的倒数
fn codec_time_unit(decoder_unit: f64, avg_frame_rate: Rational) -> f64 {
    if decoder_unit > 0.0 {
        decoder_unit
    } else if avg_frame_rate.numerator() > 0 {
        rational_seconds(avg_frame_rate.invert())
    } else {
        0.0
    }
}

/// 帧间隔：优先平均帧率，其次编解码器时间单位
fn frame_interval(avg_frame_rate: Rational, codec_unit: f64) -> Option<f64> {
    if avg_frame_rate.numerator() > 0 && avg_frame_rate.denominator() > 0 {
        Some(rational_seconds(avg_frame_rate.invert()))
    } else if codec_unit > 0.0 {
        Some(codec_unit)
    } else {
        None
    }
}

/// 容器时长（`AV_TIME_BASE` 单位）转秒，未知时为 0
fn container_duration(raw: i64) -> f64 {
    if raw <= 0 {
        0.0
    } else {
        raw as f64 * rational_seconds(ffmpeg::rescale::TIME_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_time_unit_prefers_decoder_time_base() {
        assert!((codec_time_unit(0.02, Rational::new(25, 1)) - 0.02).abs() < 1e-12);
        assert!((codec_time_unit(0.0, Rational::new(25, 1)) - 0.04).abs() < 1e-12);
        assert!(codec_time_unit(0.0, Rational::new(0, 1)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_frame_interval_fallbacks() {
        let interval = frame_interval(Rational::new(30_000, 1001), 0.0).unwrap();
        assert!((interval - 1001.0 / 30_000.0).abs() < 1e-12);
        assert_eq!(frame_interval(Rational::new(0, 1), 0.05), Some(0.05));
        assert_eq!(frame_interval(Rational::new(0, 0), 0.0), None);
    }

    #[test]
    fn test_unknown_duration_is_zero() {
        assert!(container_duration(i64::MIN).abs() < f64::EPSILON);
        assert!((container_duration(2_500_000) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_reading_feeds_after_errors() {
        assert_eq!(next_step(StreamState::Reading, Received::Frame, 0), Step::Deliver);
        assert_eq!(next_step(StreamState::Reading, Received::NeedInput, 0), Step::Feed);
        assert_eq!(next_step(StreamState::Reading, Received::Failed, 0), Step::Feed);
        assert_eq!(next_step(StreamState::Reading, Received::Finished, 0), Step::Finish);
    }

    #[test]
    fn test_draining_keeps_receiving_after_decode_error() {
        assert_eq!(next_step(StreamState::Draining, Received::Failed, 1), Step::Retry);
        assert_eq!(next_step(StreamState::Draining, Received::Frame, 1), Step::Deliver);
        assert_eq!(next_step(StreamState::Draining, Received::Finished, 0), Step::Finish);
        assert_eq!(next_step(StreamState::Draining, Received::NeedInput, 0), Step::Finish);
        // 持续出错时放弃剩余帧
        assert_eq!(
            next_step(StreamState::Draining, Received::Failed, MAX_CONSECUTIVE_DRAIN_ERRORS),
            Step::Finish
        );
    }

    #[test]
    fn test_missing_file_is_rejected_before_backend() {
        let err = DecodeEngine::open("/definitely/not/here.mkv")
            .err()
            .expect("打开不存在的文件必须失败");
        assert!(matches!(err, OpenError::NoSuchFile(_)));
    }
}
