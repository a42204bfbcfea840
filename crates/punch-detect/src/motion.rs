//! 基于加速度阈值的出拳分类
//!
//! `net = |sqrt(x² + y² + z²) - 1 g|`（去掉重力基线），超过阈值且不在冷却期内
//! 即计为一拳。强度按 `net * 9.81` 换算（m/s²），沿用原有的"速度"字段含义。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::Detection;
use crate::debounce::{EventDebouncer, PunchStatistics};
use crate::error::{DetectError, require_nonzero_ms, require_positive};
use crate::types::{MotionSample, PunchEvent, PunchSource, Side};

/// 标准重力加速度（m/s²）
pub const STANDARD_GRAVITY: f64 = 9.81;

/// 加速度分类器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionClassifierConfig {
    /// 净加速度阈值（g，严格大于）
    pub threshold_g: f64,
    /// 冷却时间（毫秒）
    pub cooldown_ms: u64,
    /// 佩戴手（写入事件的 `side`）
    pub worn_on: Side,
}

impl MotionClassifierConfig {
    /// 手表端参数：2.5 g / 300 ms
    pub fn wearable() -> Self {
        Self {
            threshold_g: 2.5,
            cooldown_ms: 300,
            worn_on: Side::Unknown,
        }
    }

    /// 保守参数：3.0 g / 500 ms
    pub fn conservative() -> Self {
        Self {
            threshold_g: 3.0,
            cooldown_ms: 500,
            worn_on: Side::Unknown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        require_positive("motion.threshold_g", self.threshold_g)?;
        require_nonzero_ms("motion.cooldown_ms", self.cooldown_ms)
    }
}

impl Default for MotionClassifierConfig {
    fn default() -> Self {
        Self::wearable()
    }
}

/// 加速度分类器
pub struct MotionClassifier {
    config: MotionClassifierConfig,
    debouncer: EventDebouncer,
}

impl MotionClassifier {
    pub fn new(config: MotionClassifierConfig) -> Self {
        let debouncer = EventDebouncer::new(config.cooldown());
        Self { config, debouncer }
    }

    pub fn config(&self) -> &MotionClassifierConfig {
        &self.config
    }

    /// 处理一个采样，至多产生一个事件
    pub fn process(&mut self, sample: &MotionSample) -> Option<PunchEvent> {
        self.detect(sample).map(|detection| detection.event)
    }

    /// 处理一个采样，附带去抖器的接受信息
    pub fn detect(&mut self, sample: &MotionSample) -> Option<Detection> {
        let net = net_acceleration(sample);
        if !net.is_finite() || net <= self.config.threshold_g {
            return None;
        }

        let speed = net * STANDARD_GRAVITY;
        let Some(acceptance) = self.debouncer.try_accept(sample.timestamp, speed) else {
            trace!(net, "motion peak inside cooldown");
            return None;
        };

        debug!(net, speed, count = acceptance.count, "motion punch detected");
        Some(Detection {
            event: PunchEvent {
                source: PunchSource::Motion,
                side: self.config.worn_on,
                magnitude: speed,
                timestamp: sample.timestamp,
            },
            acceptance,
        })
    }

    pub fn count(&self) -> u64 {
        self.debouncer.count()
    }

    pub fn statistics(&self) -> PunchStatistics {
        self.debouncer.statistics()
    }

    pub fn reset(&mut self) {
        self.debouncer.reset();
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(MotionClassifierConfig::default())
    }
}

/// 去掉 1 g 重力基线后的净加速度
pub fn net_acceleration(sample: &MotionSample) -> f64 {
    (sample.magnitude() - 1.0).abs()
}
