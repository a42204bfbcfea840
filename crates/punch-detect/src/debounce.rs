//! 事件去抖（冷却时间）与出拳统计
//!
//! 两个分类器各自持有一个 `EventDebouncer`，互不共享。冷却时间是每个实例的
//! 配置项，而不是全局常量。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 统计窗口容量
pub const HISTORY_CAPACITY: usize = 50;

/// 最近强度的环形缓冲区
///
/// 固定容量，写满后覆盖最旧的数据。
#[derive(Debug, Clone)]
pub struct MagnitudeRing {
    data: [f64; HISTORY_CAPACITY],
    /// 下一个写入位置
    write_index: usize,
    len: usize,
}

impl MagnitudeRing {
    pub fn new() -> Self {
        Self {
            data: [0.0; HISTORY_CAPACITY],
            write_index: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.data[self.write_index] = value;
        self.write_index = (self.write_index + 1) % HISTORY_CAPACITY;
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 按时间顺序（旧 → 新）迭代
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.write_index + HISTORY_CAPACITY - self.len) % HISTORY_CAPACITY;
        (0..self.len).map(move |i| self.data[(start + i) % HISTORY_CAPACITY])
    }

    pub fn max(&self) -> f64 {
        self.iter().fold(0.0, f64::max)
    }

    pub fn average(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.len = 0;
    }
}

impl Default for MagnitudeRing {
    fn default() -> Self {
        Self::new()
    }
}

/// 出拳统计快照
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PunchStatistics {
    /// 累计出拳次数
    pub count: u64,
    /// 窗口内最大强度
    pub max: f64,
    /// 窗口内平均强度
    pub average: f64,
}

/// 分类器状态（仅由所属分类器修改）
#[derive(Debug, Clone, Default)]
pub struct ClassifierState {
    last_event_time: Option<Duration>,
    history: MagnitudeRing,
    count: u64,
    max: f64,
    average: f64,
}

impl ClassifierState {
    pub fn last_event_time(&self) -> Option<Duration> {
        self.last_event_time
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn history(&self) -> &MagnitudeRing {
        &self.history
    }

    pub fn statistics(&self) -> PunchStatistics {
        PunchStatistics {
            count: self.count,
            max: self.max,
            average: self.average,
        }
    }
}

/// 一次被接受的检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceptance {
    /// 接受后的累计次数
    pub count: u64,
    /// 本次强度是否为窗口最大值
    pub is_max: bool,
    pub statistics: PunchStatistics,
}

/// 冷却时间去抖器
#[derive(Debug, Clone)]
pub struct EventDebouncer {
    cooldown: Duration,
    state: ClassifierState,
}

impl EventDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: ClassifierState::default(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    /// 是否仍在冷却期内
    ///
    /// 早于上次事件的时间戳也视为在冷却期内（迟到的数据直接丢弃）。
    pub fn is_cooling_down(&self, now: Duration) -> bool {
        match self.state.last_event_time {
            Some(last) => now < last || now - last < self.cooldown,
            None => false,
        }
    }

    /// 尝试接受一次检测
    ///
    /// 冷却期内返回 `None`，不修改任何状态。
    pub fn try_accept(&mut self, now: Duration, magnitude: f64) -> Option<Acceptance> {
        if self.is_cooling_down(now) {
            return None;
        }

        let state = &mut self.state;
        state.last_event_time = Some(now);
        state.count += 1;
        state.history.push(magnitude);
        state.max = state.history.max();
        state.average = state.history.average();

        Some(Acceptance {
            count: state.count,
            is_max: magnitude >= state.max,
            statistics: state.statistics(),
        })
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn count(&self) -> u64 {
        self.state.count
    }

    pub fn statistics(&self) -> PunchStatistics {
        self.state.statistics()
    }

    /// 重置状态（保留冷却时间配置）
    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }
}
