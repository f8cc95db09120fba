//! 帧节奏：按固定间隔睡眠，落后时不追帧

use std::thread;
use std::time::{Duration, Instant};

/// 固定间隔节拍器
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    next_tick: Instant,
}

impl Pacer {
    /// 以给定间隔创建，第一拍立即到达
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: Instant::now(),
        }
    }

    /// 计算下一拍需要等待的时长并推进节拍
    ///
    /// 已经落后时返回零并把基准重置为 `now`
    pub fn advance(&mut self, now: Instant) -> Duration {
        let Some(next) = self.next_tick.checked_add(self.interval) else {
            self.next_tick = now;
            return Duration::ZERO;
        };
        self.next_tick = next;
        if let Some(wait) = next.checked_duration_since(now) {
            wait
        } else {
            self.next_tick = now;
            Duration::ZERO
        }
    }

    /// 睡眠到下一拍
    pub fn wait(&mut self) {
        let wait = self.advance(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}
