//! 播放控制
//!
//! [`Player`] 持有一个解码器和一个滤镜图管理器：
//!
//! - `tick`：未暂停时解码一帧、经过滤镜后交给 [`FrameSink`]
//! - `handle`：执行暂停、跳转、逐帧、滤镜开关等命令
//!
//! 所有错误都在这里记录并吞掉，播放循环不会因单次跳转或滤镜切换失败而中断。

mod key_map;
mod pacer;

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{Span, debug, info, info_span, warn};

pub use key_map::{KeyMap, RawKeyCode};
pub use pacer::Pacer;

use crate::config::Settings;
use crate::filters::{FilterBackend, FilterGraphManager, GraphParams};
use crate::media::{VideoDecoder, VideoFrame};

/// 没有可用帧率时的默认帧率
const DEFAULT_FPS: f64 = 30.0;

/// 显示端
pub trait FrameSink {
    /// 显示一帧
    ///
    /// 帧只在调用期间有效，需要保留时必须复制
    fn present(&mut self, frame: &VideoFrame, position: f64, duration: f64);
}

/// 播放控制命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// 暂停 / 继续
    TogglePause,
    /// 按步长快退
    SeekBackward,
    /// 按步长快进
    SeekForward,
    /// 跳到总时长的某个比例（0.0–1.0）
    SeekRatio(f64),
    /// 从头播放
    Restart,
    /// 退出
    Quit,
    /// 前进一帧（仅暂停时）
    StepForward,
    /// 后退一帧（仅暂停时）
    StepBackward,
    /// 切换某个槽位的滤镜
    ToggleFilter(u8),
    /// 停用全部滤镜
    ClearFilters,
}

/// 一次 `tick` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 显示了一帧
    Presented,
    /// 暂停中
    Paused,
    /// 已播放到末尾
    Finished,
    /// 收到退出命令
    Quit,
}

/// 播放器
pub struct Player<D: VideoDecoder, B: FilterBackend> {
    decoder: D,
    filters: FilterGraphManager<B>,
    slots: BTreeMap<u8, String>,
    seek_step: f64,
    frame_interval: f64,
    paused: bool,
    quit: bool,
    finished: bool,
    span: Span,
}

impl<D: VideoDecoder, B: FilterBackend> Player<D, B> {
    /// 创建播放器并注册配置中的全部滤镜槽位
    pub fn new(decoder: D, backend: B, settings: &Settings) -> Self {
        Self::with_span(decoder, backend, settings, info_span!("player"))
    }

    /// 指定日志 span 创建播放器
    pub fn with_span(decoder: D, backend: B, settings: &Settings, span: Span) -> Self {
        let params = GraphParams {
            width: decoder.width(),
            height: decoder.height(),
            format: decoder.pixel_format(),
        };
        let filter_span = info_span!(parent: &span, "filters");
        let mut filters = FilterGraphManager::with_span(backend, params, filter_span);
        let mut slots = BTreeMap::new();
        for slot in &settings.filters {
            let filter = slot.filter.to_filter();
            slots.insert(slot.slot, filter.id());
            filters.register_filter(filter);
        }

        let fallback = if settings.playback.fallback_fps > 0.0 {
            settings.playback.fallback_fps
        } else {
            DEFAULT_FPS
        };
        let frame_interval = decoder
            .frame_interval()
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(1.0 / fallback);
        debug!(parent: &span, frame_interval, slots = ?slots, "播放器已创建");

        Self {
            decoder,
            filters,
            slots,
            seek_step: settings.playback.seek_step.abs(),
            frame_interval,
            paused: false,
            quit: false,
            finished: false,
            span,
        }
    }

    /// 解码器
    #[must_use]
    pub const fn decoder(&self) -> &D {
        &self.decoder
    }

    /// 滤镜图管理器
    #[must_use]
    pub const fn filters(&self) -> &FilterGraphManager<B> {
        &self.filters
    }

    /// 滤镜图管理器（可写）
    pub fn filters_mut(&mut self) -> &mut FilterGraphManager<B> {
        &mut self.filters
    }

    /// 槽位对应的滤镜标识符
    #[must_use]
    pub fn slot_filter(&self, slot: u8) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    /// 是否暂停
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// 是否已收到退出命令
    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    /// 是否已播放到末尾
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// 当前播放位置（秒）
    #[must_use]
    pub fn position(&self) -> f64 {
        self.decoder.current_pts()
    }

    /// 帧间隔（秒）
    #[must_use]
    pub const fn frame_interval(&self) -> f64 {
        self.frame_interval
    }

    /// 帧间隔
    #[must_use]
    pub fn frame_delay(&self) -> Duration {
        Duration::from_secs_f64(self.frame_interval)
    }

    /// 推进一拍
    pub fn tick<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> TickOutcome {
        if self.quit {
            TickOutcome::Quit
        } else if self.paused {
            TickOutcome::Paused
        } else if self.present_next(sink) {
            TickOutcome::Presented
        } else {
            TickOutcome::Finished
        }
    }

    /// 执行一条命令
    pub fn handle<S: FrameSink + ?Sized>(&mut self, command: PlayerCommand, sink: &mut S) {
        debug!(parent: &self.span, ?command, "命令");
        match command {
            PlayerCommand::TogglePause => {
                self.paused = !self.paused;
                if self.paused {
                    info!(parent: &self.span, "播放器暂停");
                } else {
                    info!(parent: &self.span, "继续播放");
                }
            }
            PlayerCommand::SeekBackward => {
                let target = (self.position() - self.seek_step).max(0.0);
                self.seek(target);
            }
            PlayerCommand::SeekForward => {
                let duration = self.decoder.duration();
                let mut target = self.position() + self.seek_step;
                if duration > 0.0 {
                    target = target.min(duration);
                }
                self.seek(target);
            }
            PlayerCommand::SeekRatio(ratio) => {
                if ratio.is_nan() {
                    warn!(parent: &self.span, "忽略无效的跳转比例");
                } else {
                    self.seek(ratio.clamp(0.0, 1.0) * self.decoder.duration());
                }
            }
            PlayerCommand::Restart => self.seek(0.0),
            PlayerCommand::Quit => {
                info!(parent: &self.span, "退出");
                self.quit = true;
            }
            PlayerCommand::StepForward => {
                if self.paused {
                    self.present_next(sink);
                } else {
                    debug!(parent: &self.span, "播放中忽略逐帧前进");
                }
            }
            PlayerCommand::StepBackward => {
                if self.paused {
                    self.step_backward(sink);
                } else {
                    debug!(parent: &self.span, "播放中忽略逐帧后退");
                }
            }
            PlayerCommand::ToggleFilter(slot) => self.toggle_filter(slot),
            PlayerCommand::ClearFilters => self.filters.deactivate_all(),
        }
    }

    /// 解码下一帧并显示，没有帧时返回 `false`
    fn present_next<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        match self.decoder.next_frame() {
            Some(frame) => {
                self.present(frame, sink);
                true
            }
            None => {
                if !self.finished {
                    info!(parent: &self.span, position = self.position(), "播放结束");
                    self.finished = true;
                }
                false
            }
        }
    }

    fn present<S: FrameSink + ?Sized>(&mut self, frame: VideoFrame, sink: &mut S) {
        self.finished = false;
        let outcome = self.filters.apply(frame);
        let frame = outcome.frame();
        sink.present(frame, frame.time(), self.decoder.duration());
    }

    /// 跳转到指定时间（秒），失败只记录警告
    pub fn seek(&mut self, target: f64) {
        let before = self.position();
        match self.decoder.seek(target) {
            Ok(()) => {
                self.finished = false;
                debug!(parent: &self.span, before, target, "跳转");
            }
            Err(e) => warn!(parent: &self.span, "{e}"),
        }
    }

    /// 跳到前一帧所在的关键帧，再向前解码到前一帧
    fn step_backward<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        let target = (self.position() - self.frame_interval).max(0.0);
        if let Err(e) = self.decoder.seek(target) {
            warn!(parent: &self.span, "{e}");
            return;
        }
        let threshold = target - self.frame_interval * 0.5;
        let mut chosen = None;
        while let Some(frame) = self.decoder.next_frame() {
            let reached = frame.time() >= threshold;
            chosen = Some(frame);
            if reached {
                break;
            }
        }
        match chosen {
            Some(frame) => self.present(frame, sink),
            None => self.finished = true,
        }
    }

    fn toggle_filter(&mut self, slot: u8) {
        let Some(id) = self.slots.get(&slot).cloned() else {
            debug!(parent: &self.span, slot, "未配置的滤镜槽位");
            return;
        };
        let result = if self.filters.is_active(&id) {
            self.filters.deactivate_filter(&id)
        } else {
            self.filters.activate_filter(&id)
        };
        match result {
            Ok(()) => info!(parent: &self.span, slot, id = %id, active = ?self.filters.list_active(), "切换滤镜"),
            Err(e) => warn!(parent: &self.span, slot, id = %id, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PixelBackend;
    use crate::media::{PixelFormat, SeekError};

    const STEP: f64 = 0.1;
    const FRAMES: u32 = 20;
    const GOP: u32 = 5;

    /// 每 0.1 秒一帧、每 5 帧一个关键帧的假解码器
    struct FakeDecoder {
        next: u32,
        pts: f64,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self { next: 0, pts: 0.0 }
        }
    }

    impl VideoDecoder for FakeDecoder {
        fn next_frame(&mut self) -> Option<VideoFrame> {
            if self.next >= FRAMES {
                return None;
            }
            let mut frame = VideoFrame::new(PixelFormat::Yuv420p, 4, 4);
            frame.plane_mut(0).row_mut(0).fill(255);
            let time = f64::from(self.next) * STEP;
            frame.set_timestamps(Some(i64::from(self.next)), None, time);
            self.pts = time;
            self.next += 1;
            Some(frame)
        }

        fn current_pts(&self) -> f64 {
            self.pts
        }

        fn seek(&mut self, target_seconds: f64) -> Result<(), SeekError> {
            if target_seconds.is_nan() {
                return Err(SeekError::InvalidTarget(target_seconds));
            }
            let target = target_seconds.clamp(0.0, self.duration());
            let index = (target / STEP + 1e-9) as u32;
            self.next = index - index % GOP;
            self.pts = target;
            Ok(())
        }

        fn duration(&self) -> f64 {
            f64::from(FRAMES) * STEP
        }

        fn width(&self) -> u32 {
            4
        }

        fn height(&self) -> u32 {
            4
        }

        fn frame_interval(&self) -> Option<f64> {
            Some(STEP)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        times: Vec<f64>,
        top_rows: Vec<u8>,
    }

    impl FrameSink for RecordingSink {
        fn present(&mut self, frame: &VideoFrame, position: f64, _duration: f64) {
            self.times.push(position);
            self.top_rows.push(frame.plane(0).pixel(0, 0)[0]);
        }
    }

    fn player() -> Player<FakeDecoder, PixelBackend> {
        let mut settings = Settings::default();
        settings.playback.seek_step = 1.0;
        Player::new(FakeDecoder::new(), PixelBackend::new(), &settings)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_plays_to_end_and_stays_finished() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        let mut presented = 0;
        while p.tick(&mut sink) == TickOutcome::Presented {
            presented += 1;
        }
        assert_eq!(presented, FRAMES);
        assert!(p.is_finished());
        assert_eq!(p.tick(&mut sink), TickOutcome::Finished);
        assert!(close(*sink.times.last().unwrap(), 1.9));
    }

    #[test]
    fn test_pause_and_quit() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        p.handle(PlayerCommand::TogglePause, &mut sink);
        assert_eq!(p.tick(&mut sink), TickOutcome::Paused);
        assert!(sink.times.is_empty());
        p.handle(PlayerCommand::TogglePause, &mut sink);
        assert_eq!(p.tick(&mut sink), TickOutcome::Presented);
        p.handle(PlayerCommand::Quit, &mut sink);
        assert_eq!(p.tick(&mut sink), TickOutcome::Quit);
    }

    #[test]
    fn test_seek_commands() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        p.tick(&mut sink);
        p.handle(PlayerCommand::SeekForward, &mut sink);
        p.tick(&mut sink);
        assert!(close(sink.times[1], 1.0));

        p.handle(PlayerCommand::SeekBackward, &mut sink);
        p.tick(&mut sink);
        assert!(close(sink.times[2], 0.0));

        p.handle(PlayerCommand::SeekRatio(0.25), &mut sink);
        p.tick(&mut sink);
        assert!(close(sink.times[3], 0.5));

        p.handle(PlayerCommand::SeekRatio(f64::NAN), &mut sink);
        p.handle(PlayerCommand::Restart, &mut sink);
        p.tick(&mut sink);
        assert!(close(sink.times[4], 0.0));
    }

    #[test]
    fn test_seek_after_end_resumes() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        while p.tick(&mut sink) == TickOutcome::Presented {}
        p.handle(PlayerCommand::Restart, &mut sink);
        assert!(!p.is_finished());
        assert_eq!(p.tick(&mut sink), TickOutcome::Presented);
    }

    #[test]
    fn test_frame_stepping_only_while_paused() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        for _ in 0..8 {
            p.tick(&mut sink);
        }
        p.handle(PlayerCommand::StepBackward, &mut sink);
        assert_eq!(sink.times.len(), 8);

        p.handle(PlayerCommand::TogglePause, &mut sink);
        p.handle(PlayerCommand::StepBackward, &mut sink);
        assert!(close(*sink.times.last().unwrap(), 0.6));
        p.handle(PlayerCommand::StepForward, &mut sink);
        assert!(close(*sink.times.last().unwrap(), 0.7));
        assert_eq!(p.tick(&mut sink), TickOutcome::Paused);
    }

    #[test]
    fn test_filter_slots() {
        let mut p = player();
        let mut sink = RecordingSink::default();
        assert_eq!(p.slot_filter(1), Some("vflip"));

        p.handle(PlayerCommand::ToggleFilter(1), &mut sink);
        assert_eq!(p.filters().list_active(), ["vflip"]);
        p.tick(&mut sink);
        // 第一行的标记被翻到最后一行
        assert_eq!(sink.top_rows.last(), Some(&0));

        p.handle(PlayerCommand::ToggleFilter(5), &mut sink);
        assert_eq!(p.filters().list_active(), ["vflip", "quadmirror"]);
        p.handle(PlayerCommand::ToggleFilter(1), &mut sink);
        assert_eq!(p.filters().list_active(), ["quadmirror"]);
        p.handle(PlayerCommand::ToggleFilter(99), &mut sink);
        assert_eq!(p.filters().list_active(), ["quadmirror"]);

        p.handle(PlayerCommand::ClearFilters, &mut sink);
        assert!(p.filters().list_active().is_empty());
        p.tick(&mut sink);
        assert_eq!(sink.top_rows.last(), Some(&255));
    }
}
