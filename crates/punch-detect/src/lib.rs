//! # Punch Detect
//!
//! 出拳检测（纯计算，无 I/O，无平台依赖）
//!
//! ## 模块
//!
//! - `geometry`: 2D 关键点的角度 / 距离
//! - `pose`: 基于姿态几何的规则分类器
//! - `motion`: 基于加速度阈值的分类器
//! - `debounce`: 冷却时间去抖与出拳统计（两个分类器各持一份）
//!
//! ## 线程模型
//!
//! 分类是同步的 O(1) 计算，可以直接在传感器回调中执行。分类器本身不是
//! `Sync` 共享的：每种数据源一个实例，由上层保证同一时刻只有一次分类。

pub mod debounce;
mod error;
pub mod geometry;
pub mod motion;
pub mod pose;
pub mod types;

pub use debounce::{Acceptance, EventDebouncer, HISTORY_CAPACITY, PunchStatistics};
pub use error::DetectError;
pub use motion::{MotionClassifier, MotionClassifierConfig, STANDARD_GRAVITY};
pub use pose::{PoseClassifier, PoseClassifierConfig, PoseHit, PoseRejection, PoseStrike, Stance};
pub use types::{JointId, Keypoint, MotionSample, PoseFrame, PunchEvent, PunchSource, Side};

/// 分类器输出：事件 + 去抖器的接受信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub event: PunchEvent,
    pub acceptance: Acceptance,
}
