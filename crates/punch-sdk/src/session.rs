//! 训练会话（TrainingSession）
//!
//! 把两个分类器、事件转发和会话观察者串起来：
//!
//! ```text
//! PoseFrame ──► PoseClassifier ──┐
//!                                ├─► SessionObserver(s)
//! MotionSample ► MotionClassifier┘        └─► EventRelay ─► DeviceLink
//! ```
//!
//! # 丢弃迟到帧
//!
//! 每种数据源同一时刻只允许一次分类。分类器忙时到达的帧直接丢弃并计数，
//! 不会排队（`try_lock`）。

use crate::config::PunchConfig;
use crate::error::SdkError;
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Mutex, RwLock};
use punch_detect::{
    Detection, MotionClassifier, MotionSample, PoseClassifier, PoseFrame, PunchEvent,
    PunchSource, PunchStatistics,
};
use punch_link::EventRelay;
use punch_protocol::WorkoutStatus;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 会话观察者
///
/// 回调在提交帧的线程上同步执行，应当非阻塞。
pub trait SessionObserver: Send + Sync {
    /// 检测到一次出拳
    fn on_punch_detected(&self, event: &PunchEvent);

    /// 某个数据源的累计次数变化
    fn on_count_changed(&self, source: PunchSource, count: u64) {
        let _ = (source, count);
    }
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// 该数据源的分类器正忙，帧被丢弃
    Dropped,
    /// 未检测到出拳
    Idle,
    /// 检测到出拳
    Punch(Detection),
}

impl FrameOutcome {
    pub fn detection(&self) -> Option<&Detection> {
        match self {
            Self::Punch(detection) => Some(detection),
            _ => None,
        }
    }
}

/// 会话统计
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SessionStats {
    pub pose_frames: u64,
    pub pose_dropped: u64,
    pub motion_samples: u64,
    pub motion_dropped: u64,
    /// 转发失败（消息编码错误）次数
    pub relay_errors: u64,
    pub pose: PunchStatistics,
    pub motion: PunchStatistics,
}

#[derive(Debug, Default)]
struct SessionCounters {
    pose_frames: AtomicU64,
    pose_dropped: AtomicU64,
    motion_samples: AtomicU64,
    motion_dropped: AtomicU64,
    relay_errors: AtomicU64,
}

/// 训练会话
pub struct TrainingSession {
    pose: Mutex<PoseClassifier>,
    motion: Mutex<MotionClassifier>,
    relay: Option<EventRelay>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    counters: SessionCounters,
}

impl TrainingSession {
    /// 创建会话
    ///
    /// `relay` 为 `None` 时只做本地检测（例如回放录制）。
    ///
    /// # 错误
    ///
    /// 配置无效时返回 `SdkError::Detect`。
    pub fn new(config: &PunchConfig, relay: Option<EventRelay>) -> Result<Self, SdkError> {
        config.pose.validate()?;
        config.motion.validate()?;
        Ok(Self {
            pose: Mutex::new(PoseClassifier::new(config.pose.clone())),
            motion: Mutex::new(MotionClassifier::new(config.motion.clone())),
            relay,
            observers: RwLock::new(Vec::new()),
            counters: SessionCounters::default(),
        })
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn relay(&self) -> Option<&EventRelay> {
        self.relay.as_ref()
    }

    /// 提交一帧姿态数据
    pub fn submit_pose(&self, frame: &PoseFrame) -> FrameOutcome {
        self.counters.pose_frames.fetch_add(1, Ordering::Relaxed);
        let Some(mut classifier) = self.pose.try_lock() else {
            self.counters.pose_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Pose classifier busy, dropping frame");
            return FrameOutcome::Dropped;
        };
        let detection = classifier.process(frame);
        drop(classifier);
        self.finish(detection)
    }

    /// 提交一个加速度采样
    pub fn submit_motion(&self, sample: &MotionSample) -> FrameOutcome {
        self.counters.motion_samples.fetch_add(1, Ordering::Relaxed);
        let Some(mut classifier) = self.motion.try_lock() else {
            self.counters.motion_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Motion classifier busy, dropping sample");
            return FrameOutcome::Dropped;
        };
        let detection = classifier.detect(sample);
        drop(classifier);
        self.finish(detection)
    }

    fn finish(&self, detection: Option<Detection>) -> FrameOutcome {
        let Some(detection) = detection else {
            return FrameOutcome::Idle;
        };

        for observer in self.observers.read().iter() {
            observer.on_punch_detected(&detection.event);
            observer.on_count_changed(detection.event.source, detection.acceptance.count);
        }

        if let Some(relay) = &self.relay
            && let Err(e) = relay.relay_punch(&detection)
        {
            self.counters.relay_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to relay punch: {}", e);
        }
        FrameOutcome::Punch(detection)
    }

    /// 开始训练：重置两个分类器并转发 `started`
    pub fn start(&self, at: Duration) -> Result<(), SdkError> {
        self.pose.lock().reset();
        self.motion.lock().reset();
        info!("Workout started");
        if let Some(relay) = &self.relay {
            relay.relay_workout(WorkoutStatus::Started, at)?;
        }
        Ok(())
    }

    /// 结束训练：转发两路统计中出拳较多的一路，再转发 `ended`
    pub fn end(&self, at: Duration) -> Result<SessionStats, SdkError> {
        let stats = self.stats();
        info!(
            "Workout ended: {} pose / {} motion punches",
            stats.pose.count, stats.motion.count
        );
        if let Some(relay) = &self.relay {
            let summary = if stats.motion.count >= stats.pose.count {
                &stats.motion
            } else {
                &stats.pose
            };
            if summary.count > 0 {
                relay.relay_stats(summary, at)?;
            }
            relay.relay_workout(WorkoutStatus::Ended, at)?;
        }
        Ok(stats)
    }

    /// 转发健康数据
    pub fn record_health(
        &self,
        heart_rate: Option<f64>,
        calories: Option<f64>,
        at: Duration,
    ) -> Result<(), SdkError> {
        if let Some(relay) = &self.relay {
            let delivery = relay.relay_health(heart_rate, calories, at)?;
            debug!("Relayed health data ({:?})", delivery);
        }
        Ok(())
    }

    pub fn pose_count(&self) -> u64 {
        self.pose.lock().count()
    }

    pub fn motion_count(&self) -> u64 {
        self.motion.lock().count()
    }

    pub fn stats(&self) -> SessionStats {
        let c = &self.counters;
        SessionStats {
            pose_frames: c.pose_frames.load(Ordering::Relaxed),
            pose_dropped: c.pose_dropped.load(Ordering::Relaxed),
            motion_samples: c.motion_samples.load(Ordering::Relaxed),
            motion_dropped: c.motion_dropped.load(Ordering::Relaxed),
            relay_errors: c.relay_errors.load(Ordering::Relaxed),
            pose: self.pose.lock().statistics(),
            motion: self.motion.lock().statistics(),
        }
    }
}

/// 转发给 Channel 的会话通知
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionNotification {
    Punch(PunchEvent),
    Count { source: PunchSource, count: u64 },
}

/// 把会话通知转发到有界 Channel 的观察者（队列满时丢弃并计数）
pub struct ChannelSessionObserver {
    tx: Sender<SessionNotification>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSessionObserver {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<SessionNotification>) {
        let (tx, rx) = bounded(capacity.max(1));
        let observer = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (observer, rx)
    }

    pub fn dropped(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }

    fn forward(&self, notification: SessionNotification) {
        if self.tx.try_send(notification).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl SessionObserver for ChannelSessionObserver {
    fn on_punch_detected(&self, event: &PunchEvent) {
        self.forward(SessionNotification::Punch(*event));
    }

    fn on_count_changed(&self, source: PunchSource, count: u64) {
        self.forward(SessionNotification::Count { source, count });
    }
}
